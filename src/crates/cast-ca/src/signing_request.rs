//! # 签名请求资源
//!
//! 每个签名请求对应 `<data_root>/requests/<name>/` 目录：
//!
//! - `request.csr`: 提交的 CSR，CREATE 成功后存在
//! - `request.crt`: 签发的证书，UPDATE（签发）成功后存在
//!
//! 任务参数约定：
//!
//! | 操作   | 参数                          |
//! |--------|-------------------------------|
//! | CREATE | `[csr_text: string]`          |
//! | UPDATE | `[overwrite: bool]`，缺省为假 |
//! | DELETE | `[]`                          |

use async_trait::async_trait;
use cast_jobs::{JobOutput, OperationError, Resource, ResourceManager, ResourceSummary};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::authority::CertificateAuthority;
use crate::crypto;
use crate::error::{CaError, CaResult};
use crate::serial::format_serial;
use crate::storage;
use crate::types::{IssuedCertificate, SigningRequestInfo};

/// 签名请求的资源类型名
pub const SIGNING_REQUEST_TYPE: &str = "signing_request";

const CSR_FILE: &str = "request.csr";
const CERTIFICATE_FILE: &str = "request.crt";
const MAX_NAME_LENGTH: usize = 255;

/// 检查签名请求名称
///
/// 只允许 `[A-Za-z0-9._-]`，且不能是 `.` 或 `..`。
pub fn validate_request_name(name: &str) -> CaResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(CaError::InvalidName(name.to_string()))
    }
}

/// 签名请求
pub struct SigningRequest {
    name: String,
    directory: PathBuf,
    authority: Arc<CertificateAuthority>,
}

impl SigningRequest {
    /// 创建签名请求对象，不触碰磁盘
    pub fn new(name: &str, requests_directory: &Path, authority: Arc<CertificateAuthority>) -> CaResult<Self> {
        validate_request_name(name)?;
        Ok(Self {
            name: name.to_string(),
            directory: requests_directory.join(name),
            authority,
        })
    }

    /// 请求名称
    pub fn name(&self) -> &str {
        &self.name
    }

    fn csr_path(&self) -> PathBuf {
        self.directory.join(CSR_FILE)
    }

    fn certificate_path(&self) -> PathBuf {
        self.directory.join(CERTIFICATE_FILE)
    }

    /// 已提交的 CSR
    pub async fn csr_text(&self) -> CaResult<Option<String>> {
        storage::read_optional(&self.csr_path()).await
    }

    /// 已签发的证书
    pub async fn certificate(&self) -> CaResult<Option<String>> {
        storage::read_optional(&self.certificate_path()).await
    }

    /// 是否已签发
    pub async fn is_signed(&self) -> CaResult<bool> {
        Ok(tokio::fs::try_exists(self.certificate_path()).await?)
    }

    /// 快照
    pub async fn info(&self) -> CaResult<SigningRequestInfo> {
        Ok(SigningRequestInfo {
            name: self.name.clone(),
            csr_pem: self.csr_text().await?,
            certificate_pem: self.certificate().await?,
        })
    }

    /// 保存 CSR
    ///
    /// 写入前先校验结构与自签名；已有 CSR 时返回 [`CaError::AlreadyExists`]。
    pub async fn create(&self, csr_text: &str) -> CaResult<()> {
        let owned = csr_text.to_string();
        crypto::run_blocking(move || crypto::verify_csr(&owned))
            .await
            .map_err(|e| CaError::InvalidCsr(e.to_string()))?;

        if tokio::fs::try_exists(self.csr_path()).await? {
            return Err(CaError::AlreadyExists(self.name.clone()));
        }

        storage::write_file_atomic(&self.csr_path(), csr_text.as_bytes(), false).await?;
        info!("已保存签名请求: {}", self.name);
        Ok(())
    }

    /// 签发证书
    ///
    /// 没有 CSR 时不消耗序列号。已签发且 `overwrite` 为假时返回
    /// [`CaError::AlreadySigned`]。签发前重新校验存储的 CSR。
    pub async fn sign(&self, overwrite: bool) -> CaResult<IssuedCertificate> {
        let csr_text = self
            .csr_text()
            .await?
            .ok_or_else(|| CaError::NoPendingRequest(self.name.clone()))?;

        if !overwrite && self.is_signed().await? {
            return Err(CaError::AlreadySigned(self.name.clone()));
        }

        let verified = csr_text.clone();
        crypto::run_blocking(move || crypto::verify_csr(&verified)).await?;

        let (serial, certificate_pem) = self.authority.issue(csr_text).await?;
        storage::write_file_atomic(&self.certificate_path(), certificate_pem.as_bytes(), false).await?;

        info!("已签发证书: {} (序列号 {})", self.name, format_serial(serial));
        Ok(IssuedCertificate {
            name: self.name.clone(),
            serial,
            certificate_pem,
        })
    }

    /// 删除 CSR 与证书
    ///
    /// 请求不存在时返回 `Ok(false)`。已签发的证书不会被吊销。
    pub async fn destroy(&self) -> CaResult<bool> {
        let removed_certificate = storage::remove_if_exists(&self.certificate_path()).await?;
        let removed_csr = storage::remove_if_exists(&self.csr_path()).await?;

        let removed_directory = storage::remove_dir_if_exists(&self.directory).await?;

        if removed_certificate || removed_csr {
            info!("已删除签名请求: {}", self.name);
        }
        Ok(removed_certificate || removed_csr || removed_directory)
    }
}

fn create_arguments(args: &[Value]) -> CaResult<&str> {
    match args {
        [Value::String(csr_text)] => Ok(csr_text),
        _ => Err(CaError::InvalidArguments("CREATE 需要唯一的字符串参数: CSR 文本".to_string())),
    }
}

fn update_arguments(args: &[Value]) -> CaResult<bool> {
    match args {
        [] => Ok(false),
        [Value::Bool(overwrite)] => Ok(*overwrite),
        _ => Err(CaError::InvalidArguments("UPDATE 只接受一个布尔参数: overwrite".to_string())),
    }
}

#[async_trait]
impl Resource for SigningRequest {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_formed(&self) -> Result<bool, OperationError> {
        Ok(tokio::fs::try_exists(self.csr_path()).await.map_err(CaError::from)?)
    }

    async fn on_create(&self, args: &[Value]) -> Result<JobOutput, OperationError> {
        let csr_text = create_arguments(args)?;
        self.create(csr_text).await?;
        Ok(json!({ "name": self.name, "signed": false }))
    }

    async fn on_update(&self, args: &[Value]) -> Result<JobOutput, OperationError> {
        let overwrite = update_arguments(args)?;
        let issued = self.sign(overwrite).await?;
        Ok(json!({
            "name": issued.name,
            "serial": format_serial(issued.serial),
            "certificate": issued.certificate_pem,
        }))
    }

    async fn on_delete(&self, args: &[Value]) -> Result<JobOutput, OperationError> {
        if !args.is_empty() {
            return Err(CaError::InvalidArguments("DELETE 不接受参数".to_string()).into());
        }

        if self.destroy().await? {
            Ok(json!({ "name": self.name, "deleted": true }))
        } else {
            Err(OperationError::NotFound)
        }
    }
}

/// 签名请求管理器
#[derive(Debug, Clone)]
pub struct SigningRequestManager {
    root: PathBuf,
    authority: Arc<CertificateAuthority>,
}

impl SigningRequestManager {
    /// 创建管理器，请求目录取自 CA 配置
    pub fn new(authority: Arc<CertificateAuthority>) -> Self {
        Self {
            root: authority.config().requests_directory(),
            authority,
        }
    }

    /// 共享的 CA
    pub fn authority(&self) -> &Arc<CertificateAuthority> {
        &self.authority
    }

    /// 按名称构造签名请求对象
    pub fn request(&self, name: &str) -> CaResult<SigningRequest> {
        SigningRequest::new(name, &self.root, Arc::clone(&self.authority))
    }

    /// 查找签名请求
    pub async fn find(&self, name: &str) -> CaResult<Option<SigningRequest>> {
        let request = self.request(name)?;
        if tokio::fs::try_exists(&request.directory).await? {
            Ok(Some(request))
        } else {
            Ok(None)
        }
    }

    /// 列出全部签名请求，按名称排序
    pub async fn list_requests(&self) -> CaResult<Vec<SigningRequestInfo>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut requests = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match self.request(&name) {
                Ok(request) => requests.push(request.info().await?),
                Err(_) => debug!("跳过非法的签名请求目录: {}", name),
            }
        }

        requests.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(requests)
    }
}

#[async_trait]
impl ResourceManager for SigningRequestManager {
    fn resource_type(&self) -> &str {
        SIGNING_REQUEST_TYPE
    }

    async fn get(&self, name: &str) -> Result<Option<Arc<dyn Resource>>, OperationError> {
        Ok(self.find(name).await?.map(|request| Arc::new(request) as Arc<dyn Resource>))
    }

    async fn list(&self) -> Result<Vec<ResourceSummary>, OperationError> {
        Ok(self
            .list_requests()
            .await?
            .into_iter()
            .map(|info| ResourceSummary {
                formed: info.csr_pem.is_some(),
                detail: json!({ "signed": info.is_signed() }),
                name: info.name,
            })
            .collect())
    }

    async fn instantiate(&self, name: &str) -> Result<Arc<dyn Resource>, OperationError> {
        Ok(Arc::new(self.request(name)?))
    }
}
