//! # 统一错误信息
//!
//! Cast 代理各子库共享的错误载体。各 crate 定义自己的错误枚举，
//! 在跨越模块边界（任务提交、控制接口、主程序）时转换为 [`ErrorInfo`]，
//! 统一携带错误码、消息、上下文、严重程度和类别。
//!
//! ## 错误码分段
//!
//! | 范围        | 来源                    |
//! |-------------|-------------------------|
//! | 3000 - 3999 | 任务引擎 `cast-jobs`    |
//! | 4000 - 4999 | 证书颁发机构 `cast-ca`  |
//!
//! ## 使用示例
//!
//! ```rust
//! use error::{ErrorInfo, ErrorCategory, ErrorSeverity};
//!
//! let error = ErrorInfo::new(4005, "没有待签发的请求: web-01".to_string())
//!     .with_category(ErrorCategory::NotFound)
//!     .with_severity(ErrorSeverity::Warning)
//!     .with_context("处理 UPDATE 任务".to_string());
//!
//! assert_eq!(error.code(), 4005);
//! assert!(error.is_warning());
//! ```

use std::fmt;

/// 错误严重程度
///
/// 数值越大越严重，可直接比较大小。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// 调试级别
    Debug = 0,
    /// 信息级别
    Info = 1,
    /// 警告级别：调用方输入或资源状态不满足要求
    Warning = 2,
    /// 错误级别：操作失败
    Error = 3,
    /// 严重级别：CA 状态或密钥材料可能受损
    Critical = 4,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Debug => write!(f, "调试"),
            ErrorSeverity::Info => write!(f, "信息"),
            ErrorSeverity::Warning => write!(f, "警告"),
            ErrorSeverity::Error => write!(f, "错误"),
            ErrorSeverity::Critical => write!(f, "严重"),
        }
    }
}

/// 错误类别
///
/// 运维人员据此区分“篡改/损坏”（`Verification`）与“不存在”（`NotFound`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// IO 错误
    Io,
    /// 输入校验错误
    Validation,
    /// 密码学校验失败
    Verification,
    /// 资源不存在
    NotFound,
    /// 资源状态冲突
    Conflict,
    /// 配置错误
    Configuration,
    /// 存储错误
    Storage,
    /// 加密后端错误
    Encryption,
    /// 任务调度错误
    Scheduling,
    /// 其他错误
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Io => write!(f, "IO错误"),
            ErrorCategory::Validation => write!(f, "校验错误"),
            ErrorCategory::Verification => write!(f, "验证失败"),
            ErrorCategory::NotFound => write!(f, "资源不存在"),
            ErrorCategory::Conflict => write!(f, "状态冲突"),
            ErrorCategory::Configuration => write!(f, "配置错误"),
            ErrorCategory::Storage => write!(f, "存储错误"),
            ErrorCategory::Encryption => write!(f, "加密错误"),
            ErrorCategory::Scheduling => write!(f, "调度错误"),
            ErrorCategory::Other => write!(f, "其他错误"),
        }
    }
}

/// 错误信息结构体
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    /// 错误码
    code: u32,
    /// 错误消息
    message: String,
    /// 错误上下文，按添加顺序排列
    context: Vec<String>,
    /// 错误严重程度
    severity: ErrorSeverity,
    /// 错误类别
    category: ErrorCategory,
}

impl ErrorInfo {
    /// 创建一个新的错误信息
    ///
    /// 默认严重程度为 [`ErrorSeverity::Error`]，类别为 [`ErrorCategory::Other`]。
    pub fn new(code: u32, message: String) -> Self {
        Self {
            code,
            message,
            context: Vec::new(),
            severity: ErrorSeverity::Error,
            category: ErrorCategory::Other,
        }
    }

    /// 添加错误上下文
    pub fn add_context(&mut self, context: String) {
        self.context.push(context);
    }

    /// 链式添加错误上下文
    pub fn with_context(mut self, context: String) -> Self {
        self.context.push(context);
        self
    }

    /// 设置错误严重程度
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// 设置错误类别
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    /// 获取错误码
    pub fn code(&self) -> u32 {
        self.code
    }

    /// 获取错误消息
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取错误上下文
    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// 获取错误严重程度
    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// 判断是否为严重错误
    pub fn is_critical(&self) -> bool {
        self.severity == ErrorSeverity::Critical
    }

    /// 判断是否为警告
    pub fn is_warning(&self) -> bool {
        self.severity == ErrorSeverity::Warning
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}][错误码: {}] {}",
               self.severity, self.category, self.code, self.message)?;

        for ctx in &self.context {
            write!(f, "\n  上下文: {}", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorInfo {}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ErrorInfo>;

impl From<std::io::Error> for ErrorInfo {
    fn from(err: std::io::Error) -> Self {
        let (code, category) = match err.kind() {
            std::io::ErrorKind::NotFound => (404, ErrorCategory::NotFound),
            std::io::ErrorKind::PermissionDenied => (403, ErrorCategory::Io),
            std::io::ErrorKind::AlreadyExists => (409, ErrorCategory::Conflict),
            std::io::ErrorKind::InvalidInput => (400, ErrorCategory::Validation),
            std::io::ErrorKind::InvalidData => (400, ErrorCategory::Validation),
            std::io::ErrorKind::UnexpectedEof => (400, ErrorCategory::Io),
            _ => (500, ErrorCategory::Io),
        };

        ErrorInfo::new(code, err.to_string())
            .with_category(category)
            .with_severity(ErrorSeverity::Error)
    }
}
