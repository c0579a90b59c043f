//! # 任务模型
//!
//! 定义任务、任务操作、任务状态以及提交后返回给调用方的任务句柄。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{JobError, JobErrorKind};
use crate::resource::ResourceManager;

/// 任务ID
pub type JobId = Uuid;

/// 任务参数，按位置排列
pub type JobArgs = Vec<Value>;

/// 任务成功时的输出
pub type JobOutput = Value;

/// 任务操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobOperation {
    /// 创建资源
    Create,
    /// 更新资源
    Update,
    /// 删除资源
    Delete,
}

impl fmt::Display for JobOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOperation::Create => write!(f, "CREATE"),
            JobOperation::Update => write!(f, "UPDATE"),
            JobOperation::Delete => write!(f, "DELETE"),
        }
    }
}

/// 任务状态
///
/// 状态只会沿 `Pending -> Running -> Succeeded | Failed` 推进，终态不可再变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// 已提交，等待执行
    Pending,
    /// 正在执行
    Running,
    /// 执行成功
    Succeeded,
    /// 执行失败
    Failed,
}

impl JobState {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// 检查状态转换是否合法
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Pending, JobState::Running) => true,
            // 提交即被拒绝的任务直接失败
            (JobState::Pending, JobState::Failed) => true,
            (JobState::Running, JobState::Succeeded) => true,
            (JobState::Running, JobState::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "等待中"),
            JobState::Running => write!(f, "执行中"),
            JobState::Succeeded => write!(f, "已成功"),
            JobState::Failed => write!(f, "已失败"),
        }
    }
}

/// 任务
///
/// 资源类型以管理器能力对象的形式携带，而不是类型名字符串。
#[derive(Clone)]
pub struct Job {
    /// 任务ID
    pub id: JobId,
    /// 目标资源名
    pub resource_name: String,
    /// 目标资源类型
    pub resource_type: Arc<dyn ResourceManager>,
    /// 操作
    pub operation: JobOperation,
    /// 参数
    pub args: JobArgs,
}

impl Job {
    /// 创建任务
    pub fn new(
        resource_type: Arc<dyn ResourceManager>,
        resource_name: impl Into<String>,
        operation: JobOperation,
        args: JobArgs,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_name: resource_name.into(),
            resource_type,
            operation,
            args,
        }
    }

    /// 创建 CREATE 任务
    pub fn create(resource_type: Arc<dyn ResourceManager>, resource_name: impl Into<String>, args: JobArgs) -> Self {
        Self::new(resource_type, resource_name, JobOperation::Create, args)
    }

    /// 创建 UPDATE 任务
    pub fn update(resource_type: Arc<dyn ResourceManager>, resource_name: impl Into<String>, args: JobArgs) -> Self {
        Self::new(resource_type, resource_name, JobOperation::Update, args)
    }

    /// 创建 DELETE 任务
    pub fn delete(resource_type: Arc<dyn ResourceManager>, resource_name: impl Into<String>) -> Self {
        Self::new(resource_type, resource_name, JobOperation::Delete, Vec::new())
    }

    /// 资源类型名
    pub fn type_name(&self) -> &str {
        self.resource_type.resource_type()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("resource_type", &self.type_name())
            .field("resource_name", &self.resource_name)
            .field("operation", &self.operation)
            .field("args", &self.args)
            .finish()
    }
}

/// 任务状态快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    /// 任务ID
    pub id: JobId,
    /// 资源类型名
    pub resource_type: String,
    /// 资源名
    pub resource_name: String,
    /// 操作
    pub operation: JobOperation,
    /// 当前状态
    pub state: JobState,
    /// 失败原因
    pub error: Option<String>,
    /// 提交时间
    pub submitted_at: DateTime<Utc>,
    /// 开始执行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 结束时间
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobStatus {
    pub(crate) fn pending(job: &Job) -> Self {
        Self {
            id: job.id,
            resource_type: job.type_name().to_string(),
            resource_name: job.resource_name.clone(),
            operation: job.operation,
            state: JobState::Pending,
            error: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// 任务句柄
///
/// `run` 返回后立即可用，通过 [`JobHandle::wait`] 等待任务完成。
/// 丢弃句柄不会取消任务。
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    operation: JobOperation,
    resource_type: String,
    resource_name: String,
    receiver: oneshot::Receiver<Result<JobOutput, JobError>>,
}

impl JobHandle {
    pub(crate) fn new(job: &Job, receiver: oneshot::Receiver<Result<JobOutput, JobError>>) -> Self {
        Self {
            id: job.id,
            operation: job.operation,
            resource_type: job.type_name().to_string(),
            resource_name: job.resource_name.clone(),
            receiver,
        }
    }

    /// 任务ID
    pub fn id(&self) -> JobId {
        self.id
    }

    /// 任务操作
    pub fn operation(&self) -> JobOperation {
        self.operation
    }

    /// 资源名
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// 等待任务完成
    ///
    /// 恰好返回一次结果。执行方意外消失时返回调度错误。
    pub async fn wait(self) -> Result<JobOutput, JobError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(JobError::new(
                self.operation,
                self.resource_type,
                self.resource_name,
                JobErrorKind::Dispatch("任务执行方已退出，未返回结果".to_string()),
            )),
        }
    }
}
