//! # 证书颁发机构
//!
//! 为受管节点签发身份证书。节点提交证书签名请求（CSR），CA 校验后分配
//! 序列号并用根密钥签发证书。
//!
//! ## 模块划分
//!
//! - [`crypto`]: 密钥生成、CSR 生成与验证、自签名、CSR 签发、指纹
//! - [`certgen`]: 面向文件的密钥/CSR/证书生成工具
//! - [`serial`]: OpenSSL 格式的序列号文件及其分配器
//! - [`authority`]: 根密钥与根证书的加载或初始化
//! - [`signing_request`]: 签名请求资源及其资源管理器
//! - [`config`]: CA 配置与构建器

pub mod authority;
pub mod certgen;
pub mod config;
pub mod crypto;
pub mod error;
pub mod serial;
pub mod signing_request;
pub mod storage;
pub mod types;

pub use authority::CertificateAuthority;
pub use config::{CaConfig, CaConfigBuilder, ConfigError};
pub use error::{CaError, CaResult};
pub use serial::SerialAllocator;
pub use signing_request::{SigningRequest, SigningRequestManager, SIGNING_REQUEST_TYPE};
pub use types::{CertificateSummary, DigestAlgorithm, IssuedCertificate, SigningRequestInfo, SubjectOptions};
