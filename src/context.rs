//! # 代理上下文
//!
//! 启动时创建的显式上下文，持有任务管理器、资源管理器注册表和 CA。
//! 外部提交的任务请求在这里按类型名解析为资源管理器后交给任务管理器。

use cast_ca::{CertificateAuthority, SigningRequestManager};
use cast_jobs::{Job, JobArgs, JobError, JobHandle, JobId, JobManager, JobManagerStatistics, JobOperation, JobStatus, ResourceManager};
use dashmap::DashMap;
use error::ErrorInfo;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::app::AppConfig;
use crate::AppResult;

/// 外部提交的任务请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// 资源类型名
    pub resource_type: String,
    /// 资源名
    pub resource_name: String,
    /// 操作
    pub operation: JobOperation,
    /// 位置参数
    #[serde(default)]
    pub args: JobArgs,
}

impl JobRequest {
    /// 创建任务请求
    pub fn new(
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        operation: JobOperation,
        args: JobArgs,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
            operation,
            args,
        }
    }
}

/// 代理上下文
pub struct AgentContext {
    config: AppConfig,
    job_manager: JobManager,
    managers: DashMap<String, Arc<dyn ResourceManager>>,
    authority: Arc<CertificateAuthority>,
    signing_requests: Arc<SigningRequestManager>,
}

impl AgentContext {
    /// 初始化上下文
    ///
    /// 加载或初始化 CA 材料，并注册签名请求资源类型。
    pub async fn initialize(config: AppConfig) -> AppResult<Self> {
        let ca_config = config
            .ca_config()
            .map_err(|e| ErrorInfo::from(cast_ca::CaError::from(e)))?;

        let authority = Arc::new(CertificateAuthority::open_or_create(ca_config).await?);
        let signing_requests = Arc::new(SigningRequestManager::new(Arc::clone(&authority)));

        let context = Self {
            config,
            job_manager: JobManager::new(),
            managers: DashMap::new(),
            authority,
            signing_requests: Arc::clone(&signing_requests),
        };
        context.register(signing_requests);

        info!("代理 {} 初始化完成", context.config.agent_name);
        Ok(context)
    }

    /// 注册资源管理器，同名类型会被替换
    pub fn register(&self, manager: Arc<dyn ResourceManager>) {
        let resource_type = manager.resource_type().to_string();
        debug!("注册资源类型: {}", resource_type);
        self.managers.insert(resource_type, manager);
    }

    /// 按类型名查找资源管理器
    pub fn resource_manager(&self, resource_type: &str) -> Option<Arc<dyn ResourceManager>> {
        self.managers.get(resource_type).map(|entry| Arc::clone(entry.value()))
    }

    /// 已注册的资源类型名，按名称排序
    pub fn resource_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.managers.iter().map(|entry| entry.key().clone()).collect();
        types.sort();
        types
    }

    /// 提交任务请求
    ///
    /// 未注册的资源类型在提交边界直接返回调度错误。
    pub fn submit(&self, request: JobRequest) -> Result<JobHandle, JobError> {
        let Some(manager) = self.resource_manager(&request.resource_type) else {
            return Err(JobError::dispatch(
                request.operation,
                request.resource_type.clone(),
                request.resource_name,
                format!("未知的资源类型: {}", request.resource_type),
            ));
        };

        let job = Job::new(manager, request.resource_name, request.operation, request.args);
        Ok(self.job_manager.run(job))
    }

    /// 查询任务状态
    pub fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.job_manager.status(id)
    }

    /// 清理结束超过 `older_than` 的任务状态
    pub fn prune_finished(&self, older_than: std::time::Duration) -> usize {
        self.job_manager.prune_finished(older_than)
    }

    /// 任务统计
    pub fn statistics(&self) -> JobManagerStatistics {
        self.job_manager.statistics()
    }

    /// 应用配置
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 任务管理器
    pub fn job_manager(&self) -> &JobManager {
        &self.job_manager
    }

    /// 证书颁发机构
    pub fn authority(&self) -> &Arc<CertificateAuthority> {
        &self.authority
    }

    /// 签名请求管理器
    pub fn signing_requests(&self) -> &Arc<SigningRequestManager> {
        &self.signing_requests
    }

    /// 停止接收新任务并等待已提交的任务完成
    pub async fn shutdown(&self) {
        info!("正在关闭代理 {}", self.config.agent_name);
        self.job_manager.shutdown().await;
        info!("代理 {} 已关闭", self.config.agent_name);
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("agent_name", &self.config.agent_name)
            .field("resource_types", &self.resource_types())
            .finish()
    }
}
