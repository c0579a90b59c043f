//! # Cast 应用配置
//!
//! 代理进程的顶层配置。`[ca]` 段对应证书颁发机构的各项参数，
//! 数据根目录统一由 `data_root` 给出。

use cast_ca::{CaConfig, ConfigError, DigestAlgorithm};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 配置文件路径的环境变量
pub const CONFIG_ENV: &str = "CAST_CONFIG";

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// CA 配置段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaSection {
    /// CA 主机名
    pub hostname: String,
    /// CA 邮箱
    pub email: Option<String>,
    /// 密钥长度（位）
    pub key_bits: u32,
    /// 签发证书有效期（天）
    pub validity_days: u32,
    /// 根证书有效期（天）
    pub ca_validity_days: u32,
    /// 指纹摘要算法
    pub fingerprint_digest: DigestAlgorithm,
}

impl Default for CaSection {
    fn default() -> Self {
        let defaults = CaConfig::default();
        Self {
            hostname: defaults.ca_hostname,
            email: defaults.ca_email,
            key_bits: defaults.key_bits,
            validity_days: defaults.validity_days,
            ca_validity_days: defaults.ca_validity_days,
            fingerprint_digest: defaults.fingerprint_digest,
        }
    }
}

/// 应用程序配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 代理名称，仅用于日志
    pub agent_name: String,
    /// 数据根目录
    pub data_root: PathBuf,
    /// 日志级别：trace / debug / info / warn / error
    pub log_level: String,
    /// CA 配置
    pub ca: CaSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent_name: "cast".to_string(),
            data_root: PathBuf::from("./cast_data"),
            log_level: "info".to_string(),
            ca: CaSection::default(),
        }
    }
}

impl AppConfig {
    /// 使用给定数据根目录的默认配置
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// 生成经过校验的 CA 配置
    pub fn ca_config(&self) -> Result<CaConfig, ConfigError> {
        let mut builder = CaConfig::builder()
            .with_storage_directory(&self.data_root)
            .with_ca_hostname(self.ca.hostname.clone())
            .with_key_bits(self.ca.key_bits)
            .with_validity_days(self.ca.validity_days)
            .with_ca_validity_days(self.ca.ca_validity_days)
            .with_fingerprint_digest(self.ca.fingerprint_digest);

        if let Some(email) = &self.ca.email {
            builder = builder.with_ca_email(email.clone());
        }

        builder.build()
    }

    /// 日志级别，无法识别时退回 INFO
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }

    /// 从 TOML 文本解析配置
    #[cfg(feature = "config")]
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 加载配置
    ///
    /// 依次尝试 `$CAST_CONFIG` 与 `config.toml`，都不存在时使用默认配置。
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        #[cfg(feature = "config")]
        {
            let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

            if std::path::Path::new(&config_path).exists() {
                let content = std::fs::read_to_string(&config_path)?;
                let config = Self::from_toml_str(&content)?;
                tracing::info!("从配置文件加载: {}", config_path);
                return Ok(config);
            }
        }

        tracing::info!("使用默认配置");
        Ok(Self::default())
    }
}
