//! # CA 错误定义
//!
//! 证书颁发机构专用的错误类型。“篡改/损坏”（`VerificationFailed`）与
//! “不存在”（`NotFound`、`NoPendingRequest`）被严格区分。

use cast_jobs::OperationError;
use error::{ErrorCategory, ErrorInfo, ErrorSeverity};
use std::fmt;

use crate::config::ConfigError;

/// CA 专用错误类型
#[derive(Debug, Clone)]
pub enum CaError {
    /// 提交的 CSR 结构或自签名无效
    InvalidCsr(String),

    /// 已存储的 CSR 或证书签名验证失败
    VerificationFailed(String),

    /// 签名请求已存在 CSR
    AlreadyExists(String),

    /// 签名请求已签发且未要求覆盖
    AlreadySigned(String),

    /// 签名请求没有待签的 CSR
    NoPendingRequest(String),

    /// 加密后端无法完成操作（如不支持的密钥长度）
    CryptoBackend(String),

    /// 签发证书失败
    Signing(String),

    /// 序列号分配失败
    SerialAllocation(String),

    /// 路径不存在或不是可读的证书
    NotFound(String),

    /// 非法的签名请求名称
    InvalidName(String),

    /// 任务参数形状不正确
    InvalidArguments(String),

    /// 存储相关错误
    Storage(String),

    /// 配置相关错误
    Config(ConfigError),
}

impl fmt::Display for CaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaError::InvalidCsr(msg) => write!(f, "无效的证书签名请求: {}", msg),
            CaError::VerificationFailed(msg) => write!(f, "签名验证失败: {}", msg),
            CaError::AlreadyExists(name) => write!(f, "签名请求已存在: {}", name),
            CaError::AlreadySigned(name) => write!(f, "签名请求已签发: {}", name),
            CaError::NoPendingRequest(name) => write!(f, "没有待签发的请求: {}", name),
            CaError::CryptoBackend(msg) => write!(f, "加密后端错误: {}", msg),
            CaError::Signing(msg) => write!(f, "签发证书失败: {}", msg),
            CaError::SerialAllocation(msg) => write!(f, "序列号分配失败: {}", msg),
            CaError::NotFound(path) => write!(f, "找不到证书: {}", path),
            CaError::InvalidName(name) => write!(f, "非法的签名请求名称: {:?}", name),
            CaError::InvalidArguments(msg) => write!(f, "参数错误: {}", msg),
            CaError::Storage(msg) => write!(f, "存储错误: {}", msg),
            CaError::Config(err) => write!(f, "配置错误: {}", err),
        }
    }
}

impl std::error::Error for CaError {}

impl From<ConfigError> for CaError {
    fn from(err: ConfigError) -> Self {
        CaError::Config(err)
    }
}

impl From<std::io::Error> for CaError {
    fn from(err: std::io::Error) -> Self {
        CaError::Storage(err.to_string())
    }
}

impl From<CaError> for ErrorInfo {
    fn from(err: CaError) -> Self {
        let (code, category, severity) = match &err {
            CaError::InvalidCsr(_) => (4001, ErrorCategory::Validation, ErrorSeverity::Warning),
            CaError::VerificationFailed(_) => (4002, ErrorCategory::Verification, ErrorSeverity::Critical),
            CaError::AlreadyExists(_) => (4003, ErrorCategory::Conflict, ErrorSeverity::Warning),
            CaError::AlreadySigned(_) => (4004, ErrorCategory::Conflict, ErrorSeverity::Warning),
            CaError::NoPendingRequest(_) => (4005, ErrorCategory::NotFound, ErrorSeverity::Warning),
            CaError::CryptoBackend(_) => (4006, ErrorCategory::Encryption, ErrorSeverity::Error),
            CaError::Signing(_) => (4007, ErrorCategory::Encryption, ErrorSeverity::Error),
            CaError::SerialAllocation(_) => (4008, ErrorCategory::Storage, ErrorSeverity::Critical),
            CaError::NotFound(_) => (4009, ErrorCategory::NotFound, ErrorSeverity::Warning),
            CaError::InvalidName(_) => (4010, ErrorCategory::Validation, ErrorSeverity::Warning),
            CaError::InvalidArguments(_) => (4011, ErrorCategory::Validation, ErrorSeverity::Warning),
            CaError::Storage(_) => (4012, ErrorCategory::Storage, ErrorSeverity::Error),
            CaError::Config(_) => (4013, ErrorCategory::Configuration, ErrorSeverity::Error),
        };

        ErrorInfo::new(code, err.to_string())
            .with_category(category)
            .with_severity(severity)
    }
}

impl From<CaError> for OperationError {
    fn from(err: CaError) -> Self {
        match err {
            CaError::InvalidArguments(msg) => OperationError::InvalidArguments(msg),
            CaError::InvalidName(name) => OperationError::InvalidArguments(format!("非法的签名请求名称: {:?}", name)),
            other => OperationError::failed(other),
        }
    }
}

/// CA 操作结果类型
pub type CaResult<T> = std::result::Result<T, CaError>;
