//! # 序列号分配
//!
//! 序列号文件采用 OpenSSL 格式：大写十六进制、偶数位、换行结尾，文件中
//! 保存的是“下一个可用”的序列号。分配时先把 N+1 原子落盘再返回 N，
//! 因此崩溃最多烧掉一个序列号，绝不会重复签发。

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{CaError, CaResult};
use crate::storage;

/// 初始序列号
pub const INITIAL_SERIAL: u64 = 1;

/// 按 OpenSSL 格式输出序列号（不含换行）
pub fn format_serial(serial: u64) -> String {
    let hex = format!("{:X}", serial);
    if hex.len() % 2 == 1 {
        format!("0{}", hex)
    } else {
        hex
    }
}

/// 解析 OpenSSL 格式的序列号
pub fn parse_serial(text: &str) -> CaResult<u64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CaError::SerialAllocation("序列号文件为空".to_string()));
    }

    u64::from_str_radix(trimmed, 16)
        .map_err(|e| CaError::SerialAllocation(format!("序列号格式无效 {:?}: {}", trimmed, e)))
}

/// 序列号文件不存在时写入初始值
///
/// 返回是否新建了文件。
pub async fn init_serial_file(path: &Path) -> CaResult<bool> {
    if tokio::fs::try_exists(path).await? {
        return Ok(false);
    }

    let contents = format!("{}\n", format_serial(INITIAL_SERIAL));
    storage::write_file_atomic(path, contents.as_bytes(), false).await?;
    info!("已初始化序列号文件: {}", path.display());
    Ok(true)
}

/// 进程内同一序列号文件共用一把锁
fn shared_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<DashMap<PathBuf, Arc<Mutex<()>>>> = OnceLock::new();
    LOCKS
        .get_or_init(DashMap::new)
        .entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// 规范化序列号文件路径，作为共享锁的键
async fn lock_key(path: &Path) -> CaResult<PathBuf> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| CaError::SerialAllocation(format!("无效的序列号文件路径: {}", path.display())))?;

    tokio::fs::create_dir_all(parent).await?;
    Ok(tokio::fs::canonicalize(parent).await?.join(file_name))
}

/// 序列号分配器
///
/// 同一进程内打开同一文件的所有分配器共享一把锁，与任务通道相互独立。
#[derive(Debug, Clone)]
pub struct SerialAllocator {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl SerialAllocator {
    /// 打开序列号文件，不存在时初始化
    pub async fn open(path: impl Into<PathBuf>) -> CaResult<Self> {
        let path = path.into();
        let lock = shared_lock(&lock_key(&path).await?);
        {
            let _guard = lock.lock().await;
            init_serial_file(&path).await?;
        }
        Ok(Self { path, lock })
    }

    /// 序列号文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 分配下一个序列号
    pub async fn next_serial(&self) -> CaResult<u64> {
        let _guard = self.lock.lock().await;

        let serial = self.read_current().await?;
        let next = serial
            .checked_add(1)
            .ok_or_else(|| CaError::SerialAllocation("序列号已耗尽".to_string()))?;

        let contents = format!("{}\n", format_serial(next));
        storage::write_file_atomic(&self.path, contents.as_bytes(), false)
            .await
            .map_err(|e| CaError::SerialAllocation(format!("持久化序列号失败: {}", e)))?;

        debug!("分配序列号: {}", format_serial(serial));
        Ok(serial)
    }

    /// 查看下一个将被分配的序列号，不消耗
    pub async fn peek(&self) -> CaResult<u64> {
        let _guard = self.lock.lock().await;
        self.read_current().await
    }

    async fn read_current(&self) -> CaResult<u64> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CaError::SerialAllocation(format!("读取 {} 失败: {}", self.path.display(), e)))?;
        parse_serial(&contents)
    }
}
