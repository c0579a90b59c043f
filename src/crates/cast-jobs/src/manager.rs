//! # 任务管理器
//!
//! 按 (资源类型, 资源名) 维护先进先出的执行通道（lane）。
//!
//! ## 调度规则
//!
//! - 通道空闲时任务立即开始执行，否则排在通道末尾，永不拒绝
//! - 通道中的任务一个接一个执行，前一个到达终态后才开始下一个
//! - 不同通道之间没有任何顺序约束，在 tokio 运行时上并行执行
//! - 失败的任务不会自动重试，已开始的任务总会执行到终态
//! - 关闭后拒绝新任务，并等待全部已排队任务执行完毕
//! - 终态任务的状态保留到调用方 `forget` 或 `prune_finished` 为止

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::error::{JobError, JobErrorKind};
use crate::job::{Job, JobHandle, JobId, JobOperation, JobOutput, JobState, JobStatus};
use crate::resource::OperationError;

/// 通道键：(资源类型名, 资源名)
type LaneKey = (String, String);

/// 排队中的任务
struct QueuedJob {
    job: Job,
    sender: oneshot::Sender<Result<JobOutput, JobError>>,
}

/// 任务管理器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobManagerStatistics {
    /// 已提交任务数（含被拒绝的）
    pub submitted: u64,
    /// 成功任务数
    pub succeeded: u64,
    /// 失败任务数
    pub failed: u64,
    /// 当前活跃通道数
    pub active_lanes: usize,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

struct Inner {
    /// 活跃通道；键存在即表示该通道有任务在执行
    lanes: Mutex<HashMap<LaneKey, VecDeque<QueuedJob>>>,
    /// 任务状态表，终态任务也保留
    statuses: DashMap<JobId, JobStatus>,
    /// 通道驱动任务追踪器
    tracker: TaskTracker,
    /// 是否接受新任务
    accepting: AtomicBool,
    counters: Counters,
}

/// 任务管理器
///
/// 可廉价克隆，所有克隆共享同一组通道和状态表。
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager {
    /// 创建任务管理器
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                lanes: Mutex::new(HashMap::new()),
                statuses: DashMap::new(),
                tracker: TaskTracker::new(),
                accepting: AtomicBool::new(true),
                counters: Counters::default(),
            }),
        }
    }

    /// 提交任务
    ///
    /// 立即返回任务句柄，不等待执行。必须在 tokio 运行时内调用。
    pub fn run(&self, job: Job) -> JobHandle {
        let (sender, receiver) = oneshot::channel();
        let handle = JobHandle::new(&job, receiver);

        self.inner.statuses.insert(job.id, JobStatus::pending(&job));
        self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);

        if job.resource_name.trim().is_empty() {
            self.inner.reject(QueuedJob { job, sender }, "资源名不能为空");
            return handle;
        }

        let mut lanes = self.inner.lanes.lock();
        if !self.inner.accepting.load(Ordering::SeqCst) {
            drop(lanes);
            self.inner.reject(QueuedJob { job, sender }, "任务管理器已关闭，不再接受新任务");
            return handle;
        }

        let key: LaneKey = (job.type_name().to_string(), job.resource_name.clone());
        let queued = QueuedJob { job, sender };
        match lanes.get_mut(&key) {
            Some(queue) => {
                debug!("任务进入等待队列: {} {}/{} (前方 {} 个)",
                       queued.job.operation, key.0, key.1, queue.len() + 1);
                queue.push_back(queued);
            }
            None => {
                lanes.insert(key.clone(), VecDeque::new());
                let inner = Arc::clone(&self.inner);
                self.inner.tracker.spawn(async move {
                    inner.drive_lane(key, queued).await;
                });
            }
        }

        handle
    }

    /// 查询任务状态快照
    pub fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.inner.statuses.get(id).map(|status| status.clone())
    }

    /// 移除一个已到达终态的任务状态
    ///
    /// 任务仍在排队或执行时不做任何改动，返回 `None`。
    pub fn forget(&self, id: &JobId) -> Option<JobStatus> {
        self.inner
            .statuses
            .remove_if(id, |_, status| status.state.is_terminal())
            .map(|(_, status)| status)
    }

    /// 清理结束时间早于 `older_than` 之前的终态任务状态，返回清理数量
    pub fn prune_finished(&self, older_than: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let before = self.inner.statuses.len();
        self.inner.statuses.retain(|_, status| {
            !(status.state.is_terminal() && status.finished_at.is_some_and(|finished| finished <= cutoff))
        });
        let removed = before.saturating_sub(self.inner.statuses.len());
        if removed > 0 {
            debug!("已清理 {} 条任务状态", removed);
        }
        removed
    }

    /// 是否仍接受新任务
    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }

    /// 获取统计信息
    pub fn statistics(&self) -> JobManagerStatistics {
        JobManagerStatistics {
            submitted: self.inner.counters.submitted.load(Ordering::Relaxed),
            succeeded: self.inner.counters.succeeded.load(Ordering::Relaxed),
            failed: self.inner.counters.failed.load(Ordering::Relaxed),
            active_lanes: self.inner.lanes.lock().len(),
        }
    }

    /// 关闭任务管理器
    ///
    /// 停止接受新任务，等待全部执行中和排队中的任务完成。
    pub async fn shutdown(&self) {
        {
            let _lanes = self.inner.lanes.lock();
            self.inner.accepting.store(false, Ordering::SeqCst);
        }
        self.inner.tracker.close();

        info!("任务管理器开始关闭，等待 {} 个通道排空", self.inner.tracker.len());
        self.inner.tracker.wait().await;
        info!("任务管理器已关闭");
    }
}

impl Inner {
    /// 依次执行一个通道中的全部任务
    async fn drive_lane(self: Arc<Self>, key: LaneKey, first: QueuedJob) {
        let mut current = first;
        loop {
            self.execute(current).await;

            let next = {
                let mut lanes = self.lanes.lock();
                let next = lanes.get_mut(&key).and_then(|queue| queue.pop_front());
                if next.is_none() {
                    lanes.remove(&key);
                }
                next
            };

            match next {
                Some(job) => current = job,
                None => break,
            }
        }
        debug!("通道已释放: {}/{}", key.0, key.1);
    }

    async fn execute(&self, queued: QueuedJob) {
        let QueuedJob { job, sender } = queued;
        let id = job.id;
        let operation = job.operation;
        let type_name = job.type_name().to_string();
        let resource_name = job.resource_name.clone();

        self.transition(id, JobState::Running, None);

        // 资源实现 panic 时任务仍需到达终态
        let result = match tokio::spawn(dispatch(job)).await {
            Ok(result) => result,
            Err(err) => Err(JobError::dispatch(
                operation,
                type_name.as_str(),
                resource_name.as_str(),
                format!("任务执行异常终止: {}", err),
            )),
        };

        match &result {
            Ok(_) => {
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                self.transition(id, JobState::Succeeded, None);
                info!("任务完成: {} {}/{} ({})", operation, type_name, resource_name, id);
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.transition(id, JobState::Failed, Some(err.to_string()));
                warn!("任务失败: {} ({})", err, id);
            }
        }

        // 调用方可能已丢弃句柄
        let _ = sender.send(result);
    }

    /// 不经执行直接让任务失败
    fn reject(&self, queued: QueuedJob, reason: &str) {
        let QueuedJob { job, sender } = queued;
        let err = JobError::dispatch(job.operation, job.type_name(), job.resource_name.as_str(), reason);

        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        self.transition(job.id, JobState::Failed, Some(err.to_string()));
        warn!("拒绝任务: {}", err);

        let _ = sender.send(Err(err));
    }

    fn transition(&self, id: JobId, next: JobState, error: Option<String>) {
        let Some(mut status) = self.statuses.get_mut(&id) else {
            return;
        };

        if !status.state.can_transition_to(next) {
            warn!("忽略非法的任务状态转换: {} -> {} ({})", status.state, next, id);
            return;
        }

        let now = Utc::now();
        status.state = next;
        match next {
            JobState::Running => status.started_at = Some(now),
            JobState::Succeeded | JobState::Failed => {
                status.finished_at = Some(now);
                status.error = error;
            }
            JobState::Pending => {}
        }
    }
}

/// 解析目标资源并调用对应操作
#[instrument(skip_all, fields(job_id = %job.id, operation = %job.operation, resource = %job.resource_name))]
async fn dispatch(job: Job) -> Result<JobOutput, JobError> {
    let manager = Arc::clone(&job.resource_type);
    let type_name = manager.resource_type().to_string();
    let name = job.resource_name.as_str();
    let wrap = |err: OperationError| JobError::from_operation(job.operation, &type_name, name, err);

    let resource = match job.operation {
        JobOperation::Create => match manager.get(name).await.map_err(&wrap)? {
            Some(existing) => {
                if existing.is_formed().await.map_err(&wrap)? {
                    return Err(JobError::new(job.operation, type_name.as_str(), name, JobErrorKind::ResourceExists));
                }
                debug!("复用未成形的资源对象");
                existing
            }
            None => manager.instantiate(name).await.map_err(&wrap)?,
        },
        JobOperation::Update | JobOperation::Delete => manager
            .get(name)
            .await
            .map_err(&wrap)?
            .ok_or_else(|| JobError::new(job.operation, type_name.as_str(), name, JobErrorKind::ResourceNotFound))?,
    };

    debug!("开始执行资源操作");
    let output = match job.operation {
        JobOperation::Create => resource.on_create(&job.args).await,
        JobOperation::Update => resource.on_update(&job.args).await,
        JobOperation::Delete => resource.on_delete(&job.args).await,
    };

    output.map_err(&wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, ResourceManager, ResourceSummary};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    /// 测试用资源：参数为 [延迟毫秒, 标签]，标签为 "fail" 时操作失败
    struct MockResource {
        name: String,
        formed: AtomicBool,
        registry: Arc<DashMap<String, Arc<MockResource>>>,
        log: Log,
    }

    impl MockResource {
        async fn step(&self, args: &[Value], default_tag: &str) -> Result<JobOutput, OperationError> {
            let delay = args.first().and_then(Value::as_u64).unwrap_or(0);
            let tag = args.get(1).and_then(Value::as_str).unwrap_or(default_tag).to_string();
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if tag == "fail" {
                return Err(OperationError::failed(std::io::Error::new(std::io::ErrorKind::Other, "模拟失败")));
            }
            self.log.lock().push(format!("{}:{}", self.name, tag));
            Ok(json!({ "tag": tag }))
        }
    }

    #[async_trait]
    impl Resource for MockResource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn is_formed(&self) -> Result<bool, OperationError> {
            Ok(self.formed.load(Ordering::SeqCst))
        }

        async fn on_create(&self, args: &[Value]) -> Result<JobOutput, OperationError> {
            let output = self.step(args, "create").await?;
            self.formed.store(true, Ordering::SeqCst);
            Ok(output)
        }

        async fn on_update(&self, args: &[Value]) -> Result<JobOutput, OperationError> {
            self.step(args, "update").await
        }

        async fn on_delete(&self, args: &[Value]) -> Result<JobOutput, OperationError> {
            let output = self.step(args, "delete").await?;
            self.registry.remove(&self.name);
            Ok(output)
        }
    }

    struct MockManager {
        registry: Arc<DashMap<String, Arc<MockResource>>>,
        log: Log,
    }

    impl MockManager {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                registry: Arc::new(DashMap::new()),
                log: Arc::new(Mutex::new(Vec::new())),
            })
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().clone()
        }
    }

    #[async_trait]
    impl ResourceManager for MockManager {
        fn resource_type(&self) -> &str {
            "mock"
        }

        async fn get(&self, name: &str) -> Result<Option<Arc<dyn Resource>>, OperationError> {
            Ok(self.registry.get(name).map(|r| Arc::clone(r.value()) as Arc<dyn Resource>))
        }

        async fn list(&self) -> Result<Vec<ResourceSummary>, OperationError> {
            Ok(self.registry.iter().map(|r| ResourceSummary {
                name: r.key().clone(),
                formed: r.formed.load(Ordering::SeqCst),
                detail: Value::Null,
            }).collect())
        }

        async fn instantiate(&self, name: &str) -> Result<Arc<dyn Resource>, OperationError> {
            let resource = Arc::new(MockResource {
                name: name.to_string(),
                formed: AtomicBool::new(false),
                registry: Arc::clone(&self.registry),
                log: Arc::clone(&self.log),
            });
            self.registry.insert(name.to_string(), Arc::clone(&resource));
            Ok(resource)
        }
    }

    fn args(delay_ms: u64, tag: &str) -> Vec<Value> {
        vec![json!(delay_ms), json!(tag)]
    }

    #[tokio::test]
    async fn test_same_name_jobs_run_in_submission_order() {
        let mock = MockManager::new();
        let manager = JobManager::new();
        let rm: Arc<dyn ResourceManager> = mock.clone();

        let handles = vec![
            manager.run(Job::create(rm.clone(), "a", args(50, "c"))),
            manager.run(Job::update(rm.clone(), "a", args(0, "u1"))),
            manager.run(Job::update(rm.clone(), "a", args(10, "u2"))),
            manager.run(Job::new(rm.clone(), "a", JobOperation::Delete, args(0, "d"))),
        ];

        for handle in handles {
            handle.wait().await.expect("同名任务应全部成功");
        }

        assert_eq!(mock.log(), vec!["a:c", "a:u1", "a:u2", "a:d"]);
        assert!(mock.registry.get("a").is_none(), "DELETE 后资源应被移除");
    }

    #[tokio::test]
    async fn test_different_names_run_in_parallel() {
        let mock = MockManager::new();
        let manager = JobManager::new();
        let rm: Arc<dyn ResourceManager> = mock.clone();

        let slow = manager.run(Job::create(rm.clone(), "slow", args(200, "slow")));
        let fast = manager.run(Job::create(rm.clone(), "fast", args(0, "fast")));

        fast.wait().await.unwrap();
        slow.wait().await.unwrap();

        assert_eq!(mock.log(), vec!["fast:fast", "slow:slow"], "不同名任务不应互相阻塞");
    }

    #[tokio::test]
    async fn test_create_on_formed_resource_fails() {
        let mock = MockManager::new();
        let manager = JobManager::new();
        let rm: Arc<dyn ResourceManager> = mock.clone();

        manager.run(Job::create(rm.clone(), "a", args(0, "c"))).wait().await.unwrap();
        let err = manager.run(Job::create(rm.clone(), "a", args(0, "c2"))).wait().await.unwrap_err();

        assert!(matches!(err.kind(), JobErrorKind::ResourceExists));
        assert_eq!(err.operation(), JobOperation::Create);
        assert_eq!(mock.log(), vec!["a:c"], "第二次 CREATE 不应执行");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_resource() {
        let mock = MockManager::new();
        let manager = JobManager::new();
        let rm: Arc<dyn ResourceManager> = mock.clone();

        let err = manager.run(Job::update(rm.clone(), "ghost", vec![])).wait().await.unwrap_err();
        assert!(matches!(err.kind(), JobErrorKind::ResourceNotFound));
        assert!(err.to_string().contains("ghost"));

        let err = manager.run(Job::delete(rm.clone(), "ghost")).wait().await.unwrap_err();
        assert!(matches!(err.kind(), JobErrorKind::ResourceNotFound));
        assert_eq!(err.operation(), JobOperation::Delete);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_unformed_resource_reusable() {
        let mock = MockManager::new();
        let manager = JobManager::new();
        let rm: Arc<dyn ResourceManager> = mock.clone();

        let err = manager.run(Job::create(rm.clone(), "a", args(0, "fail"))).wait().await.unwrap_err();
        assert!(err.operation_error::<std::io::Error>().is_some());

        manager.run(Job::create(rm.clone(), "a", args(0, "retry"))).wait().await
            .expect("未成形的资源应可以再次 CREATE");
        assert_eq!(mock.log(), vec!["a:retry"]);
    }

    #[tokio::test]
    async fn test_status_is_retained_after_completion() {
        let mock = MockManager::new();
        let manager = JobManager::new();
        let rm: Arc<dyn ResourceManager> = mock.clone();

        let ok = manager.run(Job::create(rm.clone(), "a", args(0, "c")));
        let ok_id = ok.id();
        let failed = manager.run(Job::update(rm.clone(), "a", args(0, "fail")));
        let failed_id = failed.id();

        ok.wait().await.unwrap();
        failed.wait().await.unwrap_err();

        let status = manager.status(&ok_id).expect("应能查询到已完成任务");
        assert_eq!(status.state, JobState::Succeeded);
        assert!(status.started_at.is_some());
        assert!(status.finished_at.is_some());
        assert!(status.error.is_none());

        let status = manager.status(&failed_id).unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert!(status.error.unwrap().contains("模拟失败"));

        let stats = manager.statistics();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.active_lanes, 0);
    }

    #[tokio::test]
    async fn test_forget_and_prune_statuses() {
        let mock = MockManager::new();
        let manager = JobManager::new();
        let rm: Arc<dyn ResourceManager> = mock.clone();

        let done = manager.run(Job::create(rm.clone(), "a", args(0, "c")));
        let done_id = done.id();
        done.wait().await.unwrap();

        let slow = manager.run(Job::create(rm.clone(), "b", args(200, "c")));
        let slow_id = slow.id();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(manager.forget(&slow_id).is_none(), "执行中的任务状态不应被移除");
        assert!(manager.status(&slow_id).is_some());

        let forgotten = manager.forget(&done_id).expect("终态任务应可移除");
        assert_eq!(forgotten.state, JobState::Succeeded);
        assert!(manager.status(&done_id).is_none());

        slow.wait().await.unwrap();
        let other = manager.run(Job::update(rm.clone(), "a", args(0, "u")));
        let other_id = other.id();
        other.wait().await.unwrap();

        assert_eq!(manager.prune_finished(Duration::from_secs(3600)), 0, "刚结束的任务不应被清理");
        assert_eq!(manager.prune_finished(Duration::ZERO), 2);
        assert!(manager.status(&slow_id).is_none());
        assert!(manager.status(&other_id).is_none());
        assert_eq!(manager.prune_finished(Duration::MAX), 0);
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let mock = MockManager::new();
        let manager = JobManager::new();
        let rm: Arc<dyn ResourceManager> = mock.clone();

        let handle = manager.run(Job::create(rm, "  ", vec![]));
        let id = handle.id();
        let err = handle.wait().await.unwrap_err();

        assert!(err.is_dispatch());
        assert_eq!(manager.status(&id).unwrap().state, JobState::Failed);
        assert!(mock.registry.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_rejects() {
        let mock = MockManager::new();
        let manager = JobManager::new();
        let rm: Arc<dyn ResourceManager> = mock.clone();

        let first = manager.run(Job::create(rm.clone(), "a", args(100, "c")));
        let queued = manager.run(Job::update(rm.clone(), "a", args(0, "u")));
        let first_id = first.id();
        let queued_id = queued.id();

        manager.shutdown().await;
        assert!(!manager.is_accepting());

        assert_eq!(manager.status(&first_id).unwrap().state, JobState::Succeeded);
        assert_eq!(manager.status(&queued_id).unwrap().state, JobState::Succeeded, "排队任务应在关闭前执行完毕");
        assert_eq!(mock.log(), vec!["a:c", "a:u"]);

        let err = manager.run(Job::update(rm.clone(), "a", vec![])).wait().await.unwrap_err();
        assert!(err.is_dispatch(), "关闭后提交应返回调度错误");
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel_job() {
        let mock = MockManager::new();
        let manager = JobManager::new();
        let rm: Arc<dyn ResourceManager> = mock.clone();

        drop(manager.run(Job::create(rm.clone(), "a", args(20, "c"))));
        manager.run(Job::update(rm.clone(), "a", args(0, "u"))).wait().await.unwrap();

        assert_eq!(mock.log(), vec!["a:c", "a:u"]);
    }
}
