//! # 任务错误定义
//!
//! 任务失败时的错误类型。错误总是携带操作类型、资源类型和资源名，
//! 保证失败消息能指明是哪个资源上的哪个操作出了问题。

use error::{ErrorCategory, ErrorInfo, ErrorSeverity};
use std::fmt;
use std::sync::Arc;

use crate::job::JobOperation;
use crate::resource::OperationError;

/// 任务错误类别
#[derive(Debug, Clone)]
pub enum JobErrorKind {
    /// CREATE 的目标资源已成形
    ResourceExists,
    /// UPDATE/DELETE 的目标资源不存在
    ResourceNotFound,
    /// 任务无法被调度（引擎已关闭、资源名为空、资源类型未知等）
    Dispatch(String),
    /// 任务参数形状不正确
    InvalidArguments(String),
    /// 资源操作本身失败
    Operation(Arc<dyn std::error::Error + Send + Sync>),
}

/// 任务错误
#[derive(Debug, Clone)]
pub struct JobError {
    operation: JobOperation,
    resource_type: String,
    resource_name: String,
    kind: JobErrorKind,
}

impl JobError {
    /// 创建任务错误
    pub fn new(
        operation: JobOperation,
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        kind: JobErrorKind,
    ) -> Self {
        Self {
            operation,
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
            kind,
        }
    }

    /// 创建调度错误
    pub fn dispatch(
        operation: JobOperation,
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(operation, resource_type, resource_name, JobErrorKind::Dispatch(reason.into()))
    }

    pub(crate) fn from_operation(
        operation: JobOperation,
        resource_type: &str,
        resource_name: &str,
        err: OperationError,
    ) -> Self {
        let kind = match err {
            OperationError::NotFound => JobErrorKind::ResourceNotFound,
            OperationError::InvalidArguments(msg) => JobErrorKind::InvalidArguments(msg),
            OperationError::Failed(inner) => JobErrorKind::Operation(inner),
        };
        Self::new(operation, resource_type, resource_name, kind)
    }

    /// 失败的操作
    pub fn operation(&self) -> JobOperation {
        self.operation
    }

    /// 资源类型名
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// 资源名
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// 错误类别
    pub fn kind(&self) -> &JobErrorKind {
        &self.kind
    }

    /// 是否为调度错误
    pub fn is_dispatch(&self) -> bool {
        matches!(self.kind, JobErrorKind::Dispatch(_))
    }

    /// 取出资源操作的具体错误
    ///
    /// 用于调用方区分领域错误，例如签名时的“已签发”与“无待签请求”。
    pub fn operation_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match &self.kind {
            JobErrorKind::Operation(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{} 失败: ", self.operation, self.resource_type, self.resource_name)?;
        match &self.kind {
            JobErrorKind::ResourceExists => write!(f, "资源已存在"),
            JobErrorKind::ResourceNotFound => write!(f, "资源不存在"),
            JobErrorKind::Dispatch(reason) => write!(f, "任务调度失败: {}", reason),
            JobErrorKind::InvalidArguments(msg) => write!(f, "参数错误: {}", msg),
            JobErrorKind::Operation(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            JobErrorKind::Operation(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<JobError> for ErrorInfo {
    fn from(err: JobError) -> Self {
        let (code, category, severity) = match &err.kind {
            JobErrorKind::ResourceExists => (3001, ErrorCategory::Conflict, ErrorSeverity::Warning),
            JobErrorKind::ResourceNotFound => (3002, ErrorCategory::NotFound, ErrorSeverity::Warning),
            JobErrorKind::Dispatch(_) => (3003, ErrorCategory::Scheduling, ErrorSeverity::Error),
            JobErrorKind::InvalidArguments(_) => (3004, ErrorCategory::Validation, ErrorSeverity::Warning),
            JobErrorKind::Operation(_) => (3005, ErrorCategory::Other, ErrorSeverity::Error),
        };

        ErrorInfo::new(code, err.to_string())
            .with_category(category)
            .with_severity(severity)
    }
}
