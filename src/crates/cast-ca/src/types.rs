//! # CA 数据类型

use serde::{Deserialize, Serialize};

/// 证书主题选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectOptions {
    /// 主机名，写入 CN
    pub hostname: String,
    /// 可选的 emailAddress
    pub email: Option<String>,
}

impl SubjectOptions {
    /// 仅包含主机名的主题
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            email: None,
        }
    }

    /// 附加 emailAddress
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// 指纹摘要算法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-1，与 OpenSSL 默认指纹一致
    #[default]
    Sha1,
    /// SHA-256
    Sha256,
}

/// 签名请求快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequestInfo {
    /// 请求名称
    pub name: String,
    /// PEM 格式的 CSR
    pub csr_pem: Option<String>,
    /// PEM 格式的已签发证书
    pub certificate_pem: Option<String>,
}

impl SigningRequestInfo {
    /// 是否已签发
    pub fn is_signed(&self) -> bool {
        self.certificate_pem.is_some()
    }
}

/// 证书摘要信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSummary {
    /// 主题 CN
    pub common_name: Option<String>,
    /// 主题 emailAddress
    pub email: Option<String>,
    /// 颁发者 CN
    pub issuer_common_name: Option<String>,
    /// 序列号，OpenSSL 十六进制格式
    pub serial: String,
    /// 生效时间（Unix 时间戳）
    pub not_before: i64,
    /// 失效时间（Unix 时间戳）
    pub not_after: i64,
    /// 是否为 CA 证书
    pub is_ca: bool,
}

/// 签发结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCertificate {
    /// 签名请求名称
    pub name: String,
    /// 序列号
    pub serial: u64,
    /// PEM 格式的证书
    pub certificate_pem: String,
}
