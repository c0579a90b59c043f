//! # 资源抽象
//!
//! 任务引擎与具体资源类型之间的接缝。资源管理器负责按名称查找和实例化资源，
//! 资源自身实现三种变更操作。同名操作的串行化由 [`crate::JobManager`] 保证，
//! 实现者只需保证不同名称上的并发调用是安全的。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::job::JobOutput;

/// 资源操作错误
///
/// 由资源实现返回，任务引擎会把它包装进带有操作类型和资源名的
/// [`crate::JobError`]。
#[derive(Debug, Clone)]
pub enum OperationError {
    /// 资源已不存在
    NotFound,
    /// 任务参数形状不正确
    InvalidArguments(String),
    /// 资源自身的领域错误
    Failed(Arc<dyn std::error::Error + Send + Sync>),
}

impl OperationError {
    /// 包装一个领域错误
    pub fn failed<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        OperationError::Failed(Arc::new(err))
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::NotFound => write!(f, "资源不存在"),
            OperationError::InvalidArguments(msg) => write!(f, "参数错误: {}", msg),
            OperationError::Failed(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for OperationError {}

/// 资源列表条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    /// 资源名
    pub name: String,
    /// 是否已成形（CREATE 已完成）
    pub formed: bool,
    /// 资源类型自定义的附加信息
    pub detail: Value,
}

/// 可被任务操作的资源
#[async_trait]
pub trait Resource: Send + Sync {
    /// 资源名
    fn name(&self) -> &str;

    /// 资源是否已成形
    ///
    /// 已成形的资源不能再次 CREATE。
    async fn is_formed(&self) -> Result<bool, OperationError>;

    /// 执行 CREATE
    async fn on_create(&self, args: &[Value]) -> Result<JobOutput, OperationError>;

    /// 执行 UPDATE
    async fn on_update(&self, args: &[Value]) -> Result<JobOutput, OperationError>;

    /// 执行 DELETE
    async fn on_delete(&self, args: &[Value]) -> Result<JobOutput, OperationError>;
}

/// 资源管理器
///
/// 一种资源类型对应一个管理器实例，作为能力对象注入到任务中。
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// 资源类型名，用于日志和提交边界的类型解析
    fn resource_type(&self) -> &str;

    /// 按名称查找资源
    async fn get(&self, name: &str) -> Result<Option<Arc<dyn Resource>>, OperationError>;

    /// 列出全部资源
    async fn list(&self) -> Result<Vec<ResourceSummary>, OperationError>;

    /// 创建一个尚未成形的资源对象
    async fn instantiate(&self, name: &str) -> Result<Arc<dyn Resource>, OperationError>;
}

impl fmt::Debug for dyn ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("resource_type", &self.resource_type())
            .finish()
    }
}
