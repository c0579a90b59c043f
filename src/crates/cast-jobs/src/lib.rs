//! # 资源任务引擎
//!
//! 把“对资源 X 执行 CREATE/UPDATE/DELETE”这一意图转换为可追踪的异步执行。
//!
//! ## 核心功能
//!
//! - **单飞执行**: 同一 (资源类型, 资源名) 同时最多一个任务在执行
//! - **先进先出**: 同名任务严格按提交顺序执行，不同名任务并行
//! - **状态可查**: 任务状态单调推进，终态在完成后仍可查询
//! - **优雅关闭**: 关闭时拒绝新任务并等待已排队任务全部完成
//!
//! 资源类型通过 [`ResourceManager`] 能力对象注入，任务引擎本身不认识任何
//! 具体资源。

pub mod error;
pub mod job;
pub mod manager;
pub mod resource;

pub use error::{JobError, JobErrorKind};
pub use job::{Job, JobArgs, JobHandle, JobId, JobOperation, JobOutput, JobState, JobStatus};
pub use manager::{JobManager, JobManagerStatistics};
pub use resource::{OperationError, Resource, ResourceManager, ResourceSummary};
