//! # 文件存储工具
//!
//! CA 的全部持久化都经过这里：写入先落到同目录临时文件，fsync 后再
//! rename，读者永远看不到写了一半的文件。

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{CaError, CaResult};

#[cfg(unix)]
fn set_mode(file: &NamedTempFile, private: bool) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    // 临时文件创建时即为 0600，公开文件再放宽
    if !private {
        file.as_file().set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_file: &NamedTempFile, _private: bool) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_directory(directory: &Path) -> std::io::Result<()> {
    std::fs::File::open(directory)?.sync_all()
}

#[cfg(not(unix))]
fn sync_directory(_directory: &Path) -> std::io::Result<()> {
    Ok(())
}

fn write_blocking(path: &Path, contents: &[u8], private: bool) -> CaResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    set_mode(&file, private)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;

    file.persist(path)
        .map_err(|e| CaError::Storage(format!("替换 {} 失败: {}", path.display(), e.error)))?;
    sync_directory(parent)?;
    Ok(())
}

/// 原子写入文件
///
/// 每次写入使用独立的临时文件，rename 后同步父目录。`private` 为真时
/// 文件自创建起即为 0600（unix），否则为 0644。
pub async fn write_file_atomic(path: &Path, contents: &[u8], private: bool) -> CaResult<()> {
    let target = path.to_path_buf();
    let contents = contents.to_vec();

    tokio::task::spawn_blocking(move || write_blocking(&target, &contents, private))
        .await
        .map_err(|e| CaError::Storage(format!("写入任务异常终止: {}", e)))??;

    debug!("已写入文件: {}", path.display());
    Ok(())
}

/// 读取文本文件，不存在时返回 `None`
pub async fn read_optional(path: &Path) -> CaResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// 删除文件，返回文件是否存在过
pub async fn remove_if_exists(path: &Path) -> CaResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// 递归删除目录，返回目录是否存在过
pub async fn remove_dir_if_exists(path: &Path) -> CaResult<bool> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(CaError::Storage(format!("删除目录 {} 失败: {}", path.display(), err))),
    }
}
