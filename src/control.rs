//! # CA 控制接口
//!
//! 面向管理端的签名请求操作。查询直接读取存储；创建、签发和删除
//! 都作为任务提交，保证同一请求上的操作按提交顺序执行。

use cast_ca::{CaResult, SigningRequestInfo, SIGNING_REQUEST_TYPE};
use cast_jobs::{JobError, JobHandle, JobOperation};
use serde_json::Value;

use crate::context::{AgentContext, JobRequest};

/// 查询签名请求，不存在时返回 `None`
pub async fn get_request(context: &AgentContext, name: &str) -> CaResult<Option<SigningRequestInfo>> {
    match context.signing_requests().find(name).await? {
        Some(request) => Ok(Some(request.info().await?)),
        None => Ok(None),
    }
}

/// 列出全部签名请求
pub async fn list_requests(context: &AgentContext) -> CaResult<Vec<SigningRequestInfo>> {
    context.signing_requests().list_requests().await
}

/// 提交 CSR
pub fn create_request(context: &AgentContext, name: &str, csr_text: &str) -> Result<JobHandle, JobError> {
    context.submit(JobRequest::new(
        SIGNING_REQUEST_TYPE,
        name,
        JobOperation::Create,
        vec![Value::String(csr_text.to_string())],
    ))
}

/// 签发证书，`overwrite` 为真时替换已有证书
pub fn sign_request(context: &AgentContext, name: &str, overwrite: bool) -> Result<JobHandle, JobError> {
    context.submit(JobRequest::new(
        SIGNING_REQUEST_TYPE,
        name,
        JobOperation::Update,
        vec![Value::Bool(overwrite)],
    ))
}

/// 删除签名请求
pub fn delete_request(context: &AgentContext, name: &str) -> Result<JobHandle, JobError> {
    context.submit(JobRequest::new(SIGNING_REQUEST_TYPE, name, JobOperation::Delete, Vec::new()))
}
