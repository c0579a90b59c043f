//! # Cast 代理
//!
//! 受管节点上的代理核心：以资源为单位排队执行 CREATE / UPDATE / DELETE
//! 任务，并提供一个证书颁发机构，节点通过“签名请求”资源提交 CSR、
//! 领取签发的证书。
//!
//! ## 模块架构
//!
//! ```text
//! cast/
//! ├── src/
//! │   ├── main.rs         # 主程序入口
//! │   ├── lib.rs          # 库入口
//! │   ├── app.rs          # 应用配置
//! │   ├── context.rs      # 代理上下文与任务提交边界
//! │   ├── control.rs      # CA 控制接口
//! │   └── crates/
//! │       ├── error/      # 错误处理框架
//! │       ├── cast-jobs/  # 任务管理器与资源抽象
//! │       └── cast-ca/    # 证书颁发机构与签名请求资源
//! ```
//!
//! ## 使用示例
//!
//! ```no_run
//! use cast::app::AppConfig;
//! use cast::context::AgentContext;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = AgentContext::initialize(AppConfig::default()).await?;
//!
//!     let handle = cast::control::sign_request(&context, "web-01", false)?;
//!     let output = handle.wait().await?;
//!     println!("{}", output);
//!
//!     context.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod context;
pub mod control;

use error::ErrorInfo;

pub use app::AppConfig;
pub use context::{AgentContext, JobRequest};

pub use cast_ca::{
    CaConfig, CaError, CertificateAuthority, CertificateSummary, DigestAlgorithm, IssuedCertificate,
    SigningRequestInfo, SubjectOptions, SIGNING_REQUEST_TYPE,
};
pub use cast_jobs::{JobError, JobErrorKind, JobHandle, JobOperation, JobState, JobStatus};

/// 应用程序结果类型
pub type AppResult<T> = std::result::Result<T, ErrorInfo>;
