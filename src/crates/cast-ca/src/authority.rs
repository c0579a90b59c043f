//! # 根密钥材料
//!
//! 首次启动时生成根私钥与自签名根证书，之后只读加载。序列号分配器
//! 由 CA 独占并在所有签名请求之间共享。

use rcgen::KeyPair;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{CaConfig, ConfigError};
use crate::crypto;
use crate::error::{CaError, CaResult};
use crate::serial::SerialAllocator;
use crate::storage;
use crate::types::SubjectOptions;

/// 证书颁发机构
pub struct CertificateAuthority {
    config: CaConfig,
    key_pair: Arc<KeyPair>,
    certificate_pem: Arc<str>,
    serials: SerialAllocator,
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("ca_hostname", &self.config.ca_hostname)
            .field("serials", &self.serials)
            .finish_non_exhaustive()
    }
}

impl CertificateAuthority {
    /// 加载已有的根密钥材料，不存在时生成
    ///
    /// 只有私钥或只有证书时拒绝启动，避免覆盖可能仍在使用的材料。
    pub async fn open_or_create(config: CaConfig) -> CaResult<Self> {
        let key_path = config.ca_key_path();
        let certificate_path = config.ca_certificate_path();

        let existing_key = storage::read_optional(&key_path).await?;
        let existing_certificate = storage::read_optional(&certificate_path).await?;

        let (key_pair, certificate_pem) = match (existing_key, existing_certificate) {
            (Some(key_pem), Some(certificate_pem)) => {
                Self::load(key_pem, certificate_pem).await?
            }
            (None, None) => Self::bootstrap(&config, &key_path, &certificate_path).await?,
            (key, _) => {
                let missing = if key.is_some() { &certificate_path } else { &key_path };
                warn!("CA 密钥材料不完整，缺少 {}", missing.display());
                return Err(CaError::Config(ConfigError::ValidationFailed(format!(
                    "CA 密钥材料不完整，缺少 {}",
                    missing.display()
                ))));
            }
        };

        let serials = SerialAllocator::open(config.serial_path()).await?;

        Ok(Self {
            config,
            key_pair: Arc::new(key_pair),
            certificate_pem: Arc::from(certificate_pem),
            serials,
        })
    }

    async fn load(key_pem: String, certificate_pem: String) -> CaResult<(KeyPair, String)> {
        crypto::run_blocking(move || {
            let key_pair = crypto::load_key_pair(&key_pem)?;
            if !crypto::key_matches_certificate(&key_pair, &certificate_pem)? {
                return Err(CaError::Config(ConfigError::ValidationFailed(
                    "CA 私钥与根证书公钥不匹配".to_string(),
                )));
            }
            info!("已加载 CA 根证书");
            Ok((key_pair, certificate_pem))
        })
        .await
    }

    async fn bootstrap(config: &CaConfig, key_path: &Path, certificate_path: &Path) -> CaResult<(KeyPair, String)> {
        let mut subject = SubjectOptions::new(config.ca_hostname.clone());
        subject.email = config.ca_email.clone();
        let bits = config.key_bits;
        let validity_days = config.ca_validity_days;

        let (key_pair, certificate_pem) = crypto::run_blocking(move || {
            let key_pair = crypto::generate_key_pair(bits)?;
            let certificate_pem = crypto::generate_self_signed(&key_pair, &subject, validity_days)?;
            Ok((key_pair, certificate_pem))
        })
        .await?;

        storage::write_file_atomic(key_path, key_pair.serialize_pem().as_bytes(), true).await?;
        storage::write_file_atomic(certificate_path, certificate_pem.as_bytes(), false).await?;

        info!("已生成 CA 根证书: CN={}", config.ca_hostname);
        Ok((key_pair, certificate_pem))
    }

    /// CA 配置
    pub fn config(&self) -> &CaConfig {
        &self.config
    }

    /// PEM 格式的根证书
    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    /// 序列号分配器
    pub fn serials(&self) -> &SerialAllocator {
        &self.serials
    }

    /// 根证书指纹
    pub fn fingerprint(&self) -> CaResult<String> {
        crypto::fingerprint_pem(&self.certificate_pem, self.config.fingerprint_digest)
    }

    /// 分配序列号并签发 CSR
    ///
    /// 返回序列号与 PEM 证书。序列号一旦分配即视为已使用，签名失败也不回收。
    pub async fn issue(&self, csr_text: String) -> CaResult<(u64, String)> {
        let serial = self.serials.next_serial().await?;

        let key_pair = Arc::clone(&self.key_pair);
        let certificate_pem = Arc::clone(&self.certificate_pem);
        let validity_days = self.config.validity_days;

        let certificate = crypto::run_blocking(move || {
            crypto::sign_csr(&csr_text, &certificate_pem, &key_pair, serial, validity_days)
        })
        .await?;

        Ok((serial, certificate))
    }
}
