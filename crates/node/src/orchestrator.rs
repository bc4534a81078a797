//! 调度节点编排器
//!
//! 一个编排器对应一个(baseTaskType, ownSign)组合：注册调度服务器、
//! 周期心跳、领导者重平衡、任务项重载与处理池的启停。编排器之间
//! 没有直接通信，全部协调经由存储完成。

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use taskshard_core::{
    generate_factory_id, NodeConfig, OwnedTaskItem, Result, ScheduleServer, SchedulerError,
    StatisticsInfo, StatisticsSnapshot, TaskHandler, TaskTypeConfig,
};
use taskshard_coordination::{is_leader, ScheduleDataManager, RELOAD_VERSION_UNSET};

use crate::pool::{PoolConfig, PoolHost, WorkerPool};

/// 启动异常描述的最大长度（字符数）
const START_ERROR_LIMIT: usize = 300;

/// 节点生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Initializing,
    /// 等待领导者完成运行时初始化
    WaitingRuntimeInfo,
    /// 等待分配到至少一个任务项
    WaitingPartitions,
    Running,
    Paused,
    Stopping,
    Stopped,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Initializing => "INITIALIZING",
            NodeState::WaitingRuntimeInfo => "WAITING_RUNTIME_INFO",
            NodeState::WaitingPartitions => "WAITING_PARTITIONS",
            NodeState::Running => "RUNNING",
            NodeState::Paused => "PAUSED",
            NodeState::Stopping => "STOPPING",
            NodeState::Stopped => "STOPPED",
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 本机节点身份
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub ip: String,
    pub host_name: String,
    /// 管理工厂标识：`{ip}${hostname}${uuid}`，同进程的节点共享
    pub factory_id: String,
}

impl NodeIdentity {
    pub fn new(ip: impl Into<String>, host_name: impl Into<String>) -> Self {
        let ip = ip.into();
        let host_name = host_name.into();
        let factory_id = generate_factory_id(&ip, &host_name);
        Self {
            ip,
            host_name,
            factory_id,
        }
    }

    /// 从节点配置解析身份，主机名缺省时自动探测
    pub fn from_node_config(config: &NodeConfig) -> Self {
        Self::new(config.ip.clone(), config.resolve_host_name())
    }
}

/// 调度节点编排器
///
/// `start` 注册服务器并启动心跳与启动任务，`stop` 反向拆除。
/// 编排器销毁前必须调用 `stop`，否则后台任务会一直持有内部状态。
pub struct NodeOrchestrator<H: TaskHandler> {
    inner: Arc<NodeInner<H>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct NodeInner<H: TaskHandler> {
    data_manager: ScheduleDataManager,
    handler: Arc<H>,
    /// 启动时加载的任务类型配置，运行期间只观察status变化
    config: TaskTypeConfig,
    base_task_type: String,
    own_sign: String,
    task_type: String,
    server: RwLock<ScheduleServer>,
    /// 串行化心跳回写与重新注册
    register_lock: Mutex<()>,
    state: RwLock<NodeState>,
    stop: AtomicBool,
    stop_notify: Notify,
    pool: RwLock<Option<Arc<WorkerPool<H>>>>,
    statistics: Arc<StatisticsInfo>,
    owned_items: RwLock<Vec<OwnedTaskItem>>,
    /// 任务类型的分片总数，运行时初始化完成后写入
    task_item_count: AtomicUsize,
    /// 心跳计算出的"需要重载"标志，处理池取数前检查
    need_reload: AtomicBool,
    /// 最近一次重载时缓存的重载版本号
    last_fetch_version: AtomicI64,
    /// 最近一次拿到任务项的时刻（毫秒），超时告警用
    last_reload_time_ms: AtomicI64,
    runtime_initial: AtomicBool,
    paused: AtomicBool,
    start_error: RwLock<Option<String>>,
}

impl<H: TaskHandler + 'static> NodeOrchestrator<H> {
    /// 注册调度服务器并启动后台任务
    ///
    /// 任务类型配置不存在时立即失败；运行时初始化在后台轮询完成，
    /// 启动阶段的异常通过 `startup_error` 暴露而不是中断进程。
    pub async fn start(
        data_manager: ScheduleDataManager,
        identity: &NodeIdentity,
        base_task_type: &str,
        own_sign: &str,
        handler: Arc<H>,
    ) -> Result<Self> {
        let config = data_manager
            .load_task_type_config(base_task_type)
            .await?
            .ok_or_else(|| SchedulerError::TaskTypeNotFound {
                base_task_type: base_task_type.to_string(),
            })?;
        // 超过配置天数没有活动的ownSign运行时视为过期残留
        data_manager
            .clear_expire_task_type_running_info(base_task_type, config.own_sign_expire_interval())
            .await?;

        let mut server = ScheduleServer::new(
            base_task_type,
            own_sign,
            &identity.ip,
            &identity.host_name,
            &identity.factory_id,
        );
        data_manager.register_schedule_server(&mut server).await?;
        info!("注册调度服务器: {}", server.uuid);

        let task_type = server.task_type.clone();
        let inner = Arc::new(NodeInner {
            data_manager,
            handler,
            config,
            base_task_type: base_task_type.to_string(),
            own_sign: own_sign.to_string(),
            task_type,
            server: RwLock::new(server),
            register_lock: Mutex::new(()),
            state: RwLock::new(NodeState::Initializing),
            stop: AtomicBool::new(false),
            stop_notify: Notify::new(),
            pool: RwLock::new(None),
            statistics: Arc::new(StatisticsInfo::new()),
            owned_items: RwLock::new(Vec::new()),
            task_item_count: AtomicUsize::new(0),
            need_reload: AtomicBool::new(true),
            last_fetch_version: AtomicI64::new(RELOAD_VERSION_UNSET),
            last_reload_time_ms: AtomicI64::new(Utc::now().timestamp_millis()),
            runtime_initial: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            start_error: RwLock::new(None),
        });

        let heartbeat = tokio::spawn(Arc::clone(&inner).heartbeat_loop());
        let startup = tokio::spawn(Arc::clone(&inner).startup_loop());
        Ok(Self {
            inner,
            tasks: Mutex::new(vec![heartbeat, startup]),
        })
    }

    /// 停止调度并等待后台任务退出
    ///
    /// 未认领的任务直接丢弃，在执行的单元允许跑完，注销动作由最后
    /// 一个退出的处理线程完成。重复调用无效果。
    pub async fn stop(&self) -> Result<()> {
        self.inner.stop().await?;
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("后台任务异常退出: {}", e);
            }
        }
        Ok(())
    }

    pub async fn state(&self) -> NodeState {
        *self.inner.state.read().await
    }

    /// 后台启动任务记录的异常描述，正常时为None
    pub async fn startup_error(&self) -> Option<String> {
        self.inner.start_error.read().await.clone()
    }

    pub async fn server_uuid(&self) -> String {
        self.inner.server.read().await.uuid.clone()
    }

    /// 当前注册记录的快照
    pub async fn server(&self) -> ScheduleServer {
        self.inner.server.read().await.clone()
    }

    pub async fn owned_task_items(&self) -> Vec<OwnedTaskItem> {
        self.inner.owned_items.read().await.clone()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.inner.statistics.snapshot()
    }

    pub async fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }
}

impl<H: TaskHandler + 'static> NodeInner<H> {
    // ------------------------------------------------------------------
    // 后台任务
    // ------------------------------------------------------------------

    async fn heartbeat_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.heart_beat_rate());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.stop.load(Ordering::Acquire) {
                        break;
                    }
                    if let Err(e) = self.refresh_schedule_server_info().await {
                        error!("心跳通知出现错误: {}", e);
                    }
                }
                _ = self.stop_notify.notified() => break,
            }
        }
    }

    async fn startup_loop(self: Arc<Self>) {
        if let Err(e) = self.startup_inner().await {
            error!("调度启动失败: {}", e);
            let message: String = format!("启动处理异常：{}", e)
                .chars()
                .take(START_ERROR_LIMIT)
                .collect();
            *self.start_error.write().await = Some(message);
        }
    }

    /// 启动流程：等待运行时初始化，再等待分配到任务项，然后启动处理池
    async fn startup_inner(self: &Arc<Self>) -> Result<()> {
        let uuid = self.server.read().await.uuid.clone();
        info!("开始获取调度任务队列...... of {}", uuid);
        self.set_state(NodeState::WaitingRuntimeInfo).await;

        let poll_interval = self.startup_poll_interval();
        loop {
            if self.stop.load(Ordering::Acquire) {
                debug!("外部命令终止调度,退出调度队列获取: {}", uuid);
                return Ok(());
            }
            self.initial_running_info().await?;
            if self
                .data_manager
                .is_initial_running_info_success(&self.base_task_type, &self.own_sign)
                .await?
            {
                self.runtime_initial.store(true, Ordering::Release);
                break;
            }
            self.wait_or_stop(poll_interval).await;
        }

        self.set_state(NodeState::WaitingPartitions).await;
        self.last_reload_time_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
        loop {
            if self.stop.load(Ordering::Acquire) {
                debug!("外部命令终止调度,退出调度队列获取: {}", uuid);
                return Ok(());
            }
            if !self.reload_task_items_now().await?.is_empty() {
                break;
            }
            self.wait_or_stop(poll_interval).await;
        }

        let owned = self.owned_items.read().await;
        let item_ids: Vec<&str> = owned.iter().map(|item| item.item_id.as_str()).collect();
        info!("获取到任务处理队列，开始调度: {} of {}", item_ids.join(","), uuid);
        drop(owned);

        let count = self.data_manager.load_all_task_item(&self.task_type).await?.len();
        self.task_item_count.store(count, Ordering::Release);
        self.ensure_pool_started().await
    }

    /// 启动轮询间隔：不快于心跳，且不超过1秒
    fn startup_poll_interval(&self) -> Duration {
        self.config.heart_beat_rate().min(Duration::from_secs(1))
    }

    /// 领导者专用的首次初始化：清理过期服务器后重建任务项子树
    async fn initial_running_info(&self) -> Result<()> {
        self.data_manager
            .clear_expire_schedule_server(&self.task_type, self.config.dead_expire_interval())
            .await?;
        let names = self
            .data_manager
            .load_schedule_server_names(&self.task_type)
            .await?;
        let uuid = self.server.read().await.uuid.clone();
        if is_leader(&uuid, &names) {
            debug!("{}: 领导者初始化运行时, 存活服务器 {}", uuid, names.len());
            self.data_manager
                .initialize_running_info(&self.base_task_type, &self.own_sign, &uuid)
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 心跳
    // ------------------------------------------------------------------

    /// 每个心跳周期执行一次的完整维护流程。
    /// 任一步骤失败都会先丢弃内存中的持有状态再上抛，避免恢复后重复派发
    async fn refresh_schedule_server_info(self: &Arc<Self>) -> Result<()> {
        match self.heartbeat_pass().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.clear_memory_info().await;
                Err(e)
            }
        }
    }

    async fn heartbeat_pass(self: &Arc<Self>) -> Result<()> {
        self.observe_task_type_status().await?;
        self.rewrite_schedule_info().await?;
        if !self.runtime_initial.load(Ordering::Acquire) {
            return Ok(());
        }
        self.assign_schedule_task().await?;

        let need_reload = self.is_need_reload().await?;
        if need_reload != self.need_reload.swap(need_reload, Ordering::AcqRel) {
            // 标志翻转立即回写，让对端尽快观察到本节点的装载状态
            self.rewrite_schedule_info().await?;
        }

        let pool_sleeping = match self.pool.read().await.as_ref() {
            Some(pool) => pool.is_sleeping(),
            None => false,
        };
        // 暂停中或处理池空转时主动重载，空闲节点靠这里接手新分配的任务项
        if self.paused.load(Ordering::Acquire) || pool_sleeping {
            self.reload_task_items_now().await?;
        }
        Ok(())
    }

    /// 观察配置的暂停状态变化并执行暂停/恢复动作
    async fn observe_task_type_status(self: &Arc<Self>) -> Result<()> {
        let config = self
            .data_manager
            .load_task_type_config(&self.base_task_type)
            .await?
            .ok_or_else(|| SchedulerError::TaskTypeNotFound {
                base_task_type: self.base_task_type.clone(),
            })?;
        let paused_now = config.is_paused();
        if paused_now && !self.paused.load(Ordering::Acquire) {
            self.pause("任务类型配置已暂停").await?;
        } else if !paused_now && self.paused.load(Ordering::Acquire) {
            self.resume("任务类型配置已恢复").await?;
        }
        Ok(())
    }

    /// 暂停调度：停掉处理池但保持注册与心跳
    async fn pause(&self, message: &str) -> Result<()> {
        if self.paused.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let uuid = self.server.read().await.uuid.clone();
        debug!("暂停调度: {} {}", uuid, message);
        self.server.write().await.is_paused = true;
        self.set_state(NodeState::Paused).await;
        let pool = self.pool.write().await.take();
        if let Some(pool) = pool {
            pool.stop().await;
        }
        Ok(())
    }

    /// 恢复调度：重建处理池
    async fn resume(self: &Arc<Self>, message: &str) -> Result<()> {
        if !self.paused.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let uuid = self.server.read().await.uuid.clone();
        debug!("恢复调度: {} {}", uuid, message);
        self.server.write().await.is_paused = false;
        if self.runtime_initial.load(Ordering::Acquire) {
            self.ensure_pool_started().await?;
        }
        Ok(())
    }

    /// 回写心跳记录；注册节点已被清理时重新注册
    async fn rewrite_schedule_info(&self) -> Result<()> {
        let _register = self.register_lock.lock().await;
        if self.stop.load(Ordering::Acquire) {
            debug!("外部命令终止调度,不再注册调度服务器");
            return Ok(());
        }
        let mut server = self.server.write().await;
        server.deal_info_desc = match self.start_error.read().await.as_ref() {
            Some(error) => error.clone(),
            None => self.statistics.snapshot().to_string(),
        };
        if !self.data_manager.refresh_schedule_server(&mut server).await? {
            warn!("注册节点 {} 已被清理，重新注册", server.uuid);
            drop(server);
            self.clear_memory_info().await;
            let mut server = self.server.write().await;
            self.data_manager.register_schedule_server(&mut server).await?;
        }
        Ok(())
    }

    /// 领导者的重平衡过程：清理过期服务器、回收死亡持有、轮转分配。
    /// 任务类型暂停期间整个过程跳过，分片与服务器都保持原样
    async fn assign_schedule_task(&self) -> Result<()> {
        if self.paused.load(Ordering::Acquire) {
            return Ok(());
        }
        self.data_manager
            .clear_expire_schedule_server(&self.task_type, self.config.dead_expire_interval())
            .await?;
        let server_list = self
            .data_manager
            .load_schedule_server_names(&self.task_type)
            .await?;
        let uuid = self.server.read().await.uuid.clone();
        if !is_leader(&uuid, &server_list) {
            debug!("{}: 不是负责任务分配的Leader,直接返回", uuid);
            return Ok(());
        }
        // 把初始化成功标记刷成当前领导者，领导者切换时新节点不会重复初始化
        self.data_manager
            .set_initial_running_info_success(&self.base_task_type, &self.task_type, &uuid)
            .await?;
        let freed = self
            .data_manager
            .clear_task_item(&self.task_type, &server_list)
            .await?;
        if freed > 0 {
            debug!("回收了 {} 个无主任务项", freed);
        }
        self.data_manager
            .assign_task_item(&self.task_type, &uuid, &server_list)
            .await?;
        Ok(())
    }

    async fn is_need_reload(&self) -> Result<bool> {
        let flag = self
            .data_manager
            .get_reload_task_item_flag(&self.task_type)
            .await?;
        Ok(self.last_fetch_version.load(Ordering::Acquire) < flag)
    }

    // ------------------------------------------------------------------
    // 任务项重载
    // ------------------------------------------------------------------

    /// 重载本节点持有的任务项。
    /// 失败时把缓存版本号复位成哨兵值，下个机会强制重试
    async fn reload_task_items_now(&self) -> Result<Vec<OwnedTaskItem>> {
        let result = self.try_reload_task_items().await;
        if result.is_err() {
            self.last_fetch_version
                .store(RELOAD_VERSION_UNSET, Ordering::Release);
        }
        result
    }

    async fn try_reload_task_items(&self) -> Result<Vec<OwnedTaskItem>> {
        let flag = self
            .data_manager
            .get_reload_task_item_flag(&self.task_type)
            .await?;
        self.last_fetch_version.store(flag, Ordering::Release);

        let uuid = self.server.read().await.uuid.clone();
        // 先交出被别人申请的任务项，再查询当前还属于自己的部分
        self.data_manager
            .release_deal_task_item(&self.task_type, &uuid)
            .await?;
        self.owned_items.write().await.clear();
        let items = self
            .data_manager
            .reload_deal_task_item(&self.task_type, &uuid)
            .await?;

        let now_ms = Utc::now().timestamp_millis();
        if items.is_empty() {
            let since = now_ms - self.last_reload_time_ms.load(Ordering::Acquire);
            if since > self.config.heart_beat_rate_ms as i64 * 10 {
                warn!(
                    "调度服务器 {} [TASK_TYPE={}] 超过10个心跳周期仍未获取到分配的任务队列",
                    uuid, self.task_type
                );
            }
        } else {
            self.last_reload_time_ms.store(now_ms, Ordering::Release);
        }

        *self.owned_items.write().await = items.clone();
        Ok(items)
    }

    // ------------------------------------------------------------------
    // 处理池
    // ------------------------------------------------------------------

    async fn ensure_pool_started(self: &Arc<Self>) -> Result<()> {
        if self.stop.load(Ordering::Acquire) {
            return Ok(());
        }
        if self.paused.load(Ordering::Acquire) {
            self.set_state(NodeState::Paused).await;
            return Ok(());
        }
        let mut slot = self.pool.write().await;
        if slot.is_none() {
            let pool_config = PoolConfig::from_task_type(
                &self.config,
                &self.own_sign,
                self.task_item_count.load(Ordering::Acquire),
            );
            let pool = WorkerPool::new(
                Arc::clone(&self.handler),
                Arc::downgrade(self) as Weak<dyn PoolHost>,
                Arc::clone(&self.statistics),
                pool_config,
            );
            pool.start().await;
            *slot = Some(pool);
        }
        drop(slot);
        self.set_state(NodeState::Running).await;
        Ok(())
    }

    /// 丢弃内存中已取得的任务项与待处理队列（心跳失败或重新注册时）
    async fn clear_memory_info(&self) {
        self.owned_items.write().await.clear();
        let pool = self.pool.read().await.clone();
        if let Some(pool) = pool {
            pool.clear_pending().await;
        }
    }

    // ------------------------------------------------------------------
    // 停止
    // ------------------------------------------------------------------

    async fn stop(&self) -> Result<()> {
        if self.stop.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let uuid = self.server.read().await.uuid.clone();
        info!("停止服务器: {}", uuid);
        self.set_state(NodeState::Stopping).await;
        // 注销门闩依赖非暂停状态
        self.paused.store(false, Ordering::Release);
        self.stop_notify.notify_waiters();
        let pool = self.pool.write().await.take();
        match pool {
            Some(pool) => pool.stop().await,
            None => self.unregister_schedule_server().await?,
        }
        self.set_state(NodeState::Stopped).await;
        Ok(())
    }

    /// 注销调度服务器。暂停只是停池，注册与心跳必须保持存活
    async fn unregister_schedule_server(&self) -> Result<()> {
        let _register = self.register_lock.lock().await;
        if self.paused.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut server = self.server.write().await;
        if server.is_registered() {
            self.data_manager
                .unregister_schedule_server(&server.task_type, &server.uuid)
                .await?;
            server.registered = false;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 辅助
    // ------------------------------------------------------------------

    async fn set_state(&self, state: NodeState) {
        *self.state.write().await = state;
    }

    /// 停止通知可中断的等待
    async fn wait_or_stop(&self, duration: Duration) {
        let notified = self.stop_notify.notified();
        if self.stop.load(Ordering::Acquire) {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = notified => {}
        }
    }
}

#[async_trait]
impl<H: TaskHandler + 'static> PoolHost for NodeInner<H> {
    async fn current_task_items(&self) -> Result<Vec<OwnedTaskItem>> {
        if self.need_reload.load(Ordering::Acquire) {
            // 必须等处理池完全排空才能切换任务项代，否则跨代数据会重复处理
            let pool = self.pool.read().await.clone();
            if let Some(pool) = pool {
                pool.wait_until_drained().await;
            }
            self.reload_task_items_now().await?;
        }
        self.last_reload_time_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
        Ok(self.owned_items.read().await.clone())
    }

    fn continue_when_no_data(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
    }

    async fn mark_fetch_time(&self) {
        self.server.write().await.last_fetch_time = Some(Utc::now());
    }

    async fn on_workers_exhausted(&self) {
        if let Err(e) = self.unregister_schedule_server().await {
            error!("注销调度服务器失败: {}", e);
        }
    }
}
