//! # CA 配置管理
//!
//! 提供证书颁发机构的配置及其构建器。构建时完成参数校验，
//! 运行期拿到的 [`CaConfig`] 总是合法的。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::DigestAlgorithm;

/// CA 配置错误类型
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// 无效的密钥长度
    InvalidKeySize(u32),

    /// 无效的有效期
    InvalidValidityPeriod(u32),

    /// 无效的存储路径
    InvalidStoragePath(String),

    /// 配置验证失败
    ValidationFailed(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidKeySize(size) => write!(f, "无效的密钥长度: {}", size),
            ConfigError::InvalidValidityPeriod(days) => write!(f, "无效的有效期: {} 天", days),
            ConfigError::InvalidStoragePath(path) => write!(f, "无效的存储路径: {}", path),
            ConfigError::ValidationFailed(msg) => write!(f, "配置验证失败: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// 支持的密钥长度：255 为 Ed25519，256/384 为 ECDSA 曲线，其余为 RSA
pub const SUPPORTED_KEY_BITS: [u32; 6] = [255, 256, 384, 2048, 3072, 4096];

/// CA 配置构建器
#[derive(Debug, Clone)]
pub struct CaConfigBuilder {
    storage_directory: PathBuf,
    ca_hostname: String,
    ca_email: Option<String>,
    key_bits: u32,
    validity_days: u32,
    ca_validity_days: u32,
    fingerprint_digest: DigestAlgorithm,
}

impl Default for CaConfigBuilder {
    fn default() -> Self {
        let defaults = CaConfig::default();
        Self {
            storage_directory: defaults.storage_directory,
            ca_hostname: defaults.ca_hostname,
            ca_email: defaults.ca_email,
            key_bits: defaults.key_bits,
            validity_days: defaults.validity_days,
            ca_validity_days: defaults.ca_validity_days,
            fingerprint_digest: defaults.fingerprint_digest,
        }
    }
}

impl CaConfigBuilder {
    /// 创建新的配置构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置数据根目录
    pub fn with_storage_directory<P: AsRef<Path>>(mut self, directory: P) -> Self {
        self.storage_directory = directory.as_ref().to_path_buf();
        self
    }

    /// 设置 CA 主机名（根证书 CN）
    pub fn with_ca_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.ca_hostname = hostname.into();
        self
    }

    /// 设置 CA 邮箱
    pub fn with_ca_email(mut self, email: impl Into<String>) -> Self {
        self.ca_email = Some(email.into());
        self
    }

    /// 设置密钥长度（位）
    pub fn with_key_bits(mut self, bits: u32) -> Self {
        self.key_bits = bits;
        self
    }

    /// 设置签发证书有效期（天）
    pub fn with_validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    /// 设置根证书有效期（天）
    pub fn with_ca_validity_days(mut self, days: u32) -> Self {
        self.ca_validity_days = days;
        self
    }

    /// 设置指纹摘要算法
    pub fn with_fingerprint_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.fingerprint_digest = digest;
        self
    }

    /// 构建并验证配置
    pub fn build(self) -> Result<CaConfig, ConfigError> {
        self.validate()?;
        Ok(CaConfig {
            storage_directory: self.storage_directory,
            ca_hostname: self.ca_hostname,
            ca_email: self.ca_email,
            key_bits: self.key_bits,
            validity_days: self.validity_days,
            ca_validity_days: self.ca_validity_days,
            fingerprint_digest: self.fingerprint_digest,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_KEY_BITS.contains(&self.key_bits) {
            return Err(ConfigError::InvalidKeySize(self.key_bits));
        }

        if self.validity_days < 1 || self.validity_days > 3650 {
            return Err(ConfigError::InvalidValidityPeriod(self.validity_days));
        }

        if self.ca_validity_days < 1 || self.ca_validity_days > 7300 {
            return Err(ConfigError::InvalidValidityPeriod(self.ca_validity_days));
        }

        if self.storage_directory.as_os_str().is_empty() {
            return Err(ConfigError::InvalidStoragePath("存储路径不能为空".to_string()));
        }

        if self.ca_hostname.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("CA 主机名不能为空".to_string()));
        }

        if let Some(email) = &self.ca_email {
            if !email.is_ascii() || !email.contains('@') {
                return Err(ConfigError::ValidationFailed(format!("无效的 CA 邮箱: {}", email)));
            }
        }

        Ok(())
    }
}

/// CA 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaConfig {
    /// 数据根目录
    pub storage_directory: PathBuf,

    /// CA 主机名
    pub ca_hostname: String,

    /// CA 邮箱
    pub ca_email: Option<String>,

    /// 密钥长度（位）
    pub key_bits: u32,

    /// 签发证书有效期（天）
    pub validity_days: u32,

    /// 根证书有效期（天）
    pub ca_validity_days: u32,

    /// 指纹摘要算法
    pub fingerprint_digest: DigestAlgorithm,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            storage_directory: PathBuf::from("./data"),
            ca_hostname: "cast-ca.local".to_string(),
            ca_email: None,
            key_bits: 256,
            validity_days: 365,
            ca_validity_days: 3650,
            fingerprint_digest: DigestAlgorithm::Sha1,
        }
    }
}

impl CaConfig {
    /// 创建配置构建器
    pub fn builder() -> CaConfigBuilder {
        CaConfigBuilder::new()
    }

    /// CA 密钥材料目录
    pub fn ca_directory(&self) -> PathBuf {
        self.storage_directory.join("ca")
    }

    /// 根私钥路径
    pub fn ca_key_path(&self) -> PathBuf {
        self.ca_directory().join("ca.key")
    }

    /// 根证书路径
    pub fn ca_certificate_path(&self) -> PathBuf {
        self.ca_directory().join("ca.crt")
    }

    /// 序列号文件路径
    pub fn serial_path(&self) -> PathBuf {
        self.ca_directory().join("ca.srl")
    }

    /// 签名请求目录
    pub fn requests_directory(&self) -> PathBuf {
        self.storage_directory.join("requests")
    }
}
