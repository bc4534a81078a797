//! 任务处理池
//!
//! 每个节点为其任务类型启动一个处理池，按配置的线程数并发运行
//! 认领/执行循环。池通过弱引用回望宿主节点获取当前持有的任务项，
//! 宿主销毁后一切回调按停止处理，不形成引用环。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use taskshard_core::{
    ExecuteMode, OwnedTaskItem, Result, StatisticsInfo, TaskHandler, TaskTypeConfig,
};

use crate::queues::WorkQueues;

/// 处理池回望宿主节点的窄接口
///
/// 池只保存 `Weak` 引用，升级失败意味着宿主已销毁，按停止处理。
#[async_trait]
pub trait PoolHost: Send + Sync {
    /// 当前持有的任务项，必要时宿主会先等待排空再重载
    async fn current_task_items(&self) -> Result<Vec<OwnedTaskItem>>;

    /// 一次拉取无数据后是否继续轮询
    fn continue_when_no_data(&self) -> bool;

    /// 拉取动作完成后盖上拉取时间戳
    async fn mark_fetch_time(&self);

    /// 最后一个处理线程退出时回调，停止流程在此注销服务器
    async fn on_workers_exhausted(&self);
}

/// 处理池的运行参数，由任务类型配置在池构造时固化
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub task_parameter: String,
    pub own_sign: String,
    /// 任务类型的分片总数
    pub task_item_count: usize,
    pub thread_count: usize,
    pub fetch_batch_size: usize,
    pub batch_execute_count: usize,
    /// 每轮装载前的固定休眠
    pub inter_batch_sleep: Duration,
    pub no_data_sleep: Duration,
}

impl PoolConfig {
    pub fn from_task_type(config: &TaskTypeConfig, own_sign: &str, task_item_count: usize) -> Self {
        Self {
            task_parameter: config.task_parameter.clone(),
            own_sign: own_sign.to_string(),
            task_item_count,
            thread_count: config.thread_count,
            fetch_batch_size: config.fetch_batch_size,
            batch_execute_count: config.batch_execute_count,
            inter_batch_sleep: Duration::from_millis(config.inter_batch_sleep_ms),
            no_data_sleep: Duration::from_millis(config.no_data_sleep_ms),
        }
    }
}

/// 并发处理池
///
/// 停止时丢弃未认领的任务，已在执行的单元允许跑完；向协调存储
/// 注销服务器的动作由最后一个退出的处理线程通过宿主回调完成。
pub struct WorkerPool<H: TaskHandler> {
    handler: Arc<H>,
    host: Weak<dyn PoolHost>,
    queues: Arc<WorkQueues<H::Unit>>,
    statistics: Arc<StatisticsInfo>,
    config: PoolConfig,
    /// Single能力下恒为1，与配置的批量值无关
    effective_batch: usize,
    stop: AtomicBool,
    stop_notify: Notify,
    active_workers: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<H: TaskHandler + 'static> WorkerPool<H> {
    pub fn new(
        handler: Arc<H>,
        host: Weak<dyn PoolHost>,
        statistics: Arc<StatisticsInfo>,
        config: PoolConfig,
    ) -> Arc<Self> {
        if config.fetch_batch_size < config.thread_count * 10 {
            warn!(
                "参数设置不合理，系统性能不佳：单次拉取数量 {} 应当不小于线程数量 {} 的10倍",
                config.fetch_batch_size, config.thread_count
            );
        }
        let effective_batch = match handler.execute_mode() {
            ExecuteMode::Single => 1,
            ExecuteMode::Batch => config.batch_execute_count.max(1),
        };
        Arc::new(Self {
            handler,
            host,
            queues: Arc::new(WorkQueues::new()),
            statistics,
            config,
            effective_batch,
            stop: AtomicBool::new(false),
            stop_notify: Notify::new(),
            active_workers: AtomicUsize::new(0),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// 启动全部处理线程，重复调用无效果
    pub async fn start(self: &Arc<Self>) {
        let mut workers = self.workers.lock().await;
        if !workers.is_empty() {
            return;
        }
        self.active_workers
            .store(self.config.thread_count, Ordering::Release);
        for index in 0..self.config.thread_count {
            let pool = Arc::clone(self);
            workers.push(tokio::spawn(async move {
                pool.worker_loop(index).await;
            }));
        }
    }

    /// 停止调度：丢弃全部未认领任务，等待在执行的单元完成
    pub async fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.stop_notify.notify_waiters();
        self.queues.clear_pending().await;
        let handles: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("处理线程异常退出: {}", e);
            }
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn effective_batch(&self) -> usize {
        self.effective_batch
    }

    /// 装载线程是否正处于空闲休眠
    pub fn is_sleeping(&self) -> bool {
        self.queues.is_sleeping()
    }

    pub async fn is_drained(&self) -> bool {
        self.queues.is_drained().await
    }

    pub async fn wait_until_drained(&self) {
        self.queues.wait_until_drained().await;
    }

    /// 丢弃未认领的任务单元（心跳失败后的内存清理路径）
    pub async fn clear_pending(&self) {
        self.queues.clear_pending().await;
    }

    pub async fn pending_len(&self) -> usize {
        self.queues.pending_len().await
    }

    pub async fn running_len(&self) -> usize {
        self.queues.running_len().await
    }

    async fn worker_loop(self: Arc<Self>, index: usize) {
        debug!("处理线程 {} 启动", index);
        loop {
            if self.stop.load(Ordering::Acquire) {
                break;
            }
            let batch = self
                .queues
                .claim_batch(self.effective_batch, |a, b| self.is_same_unit(a, b))
                .await;
            if batch.is_empty() {
                self.load_more().await;
                continue;
            }
            self.execute_batch(&batch).await;
        }
        let remaining = self.active_workers.fetch_sub(1, Ordering::AcqRel) - 1;
        debug!("处理线程 {} 退出, 剩余 {}", index, remaining);
        if remaining == 0 {
            if let Some(host) = self.host.upgrade() {
                host.on_workers_exhausted().await;
            }
        }
    }

    async fn execute_batch(&self, batch: &[H::Unit]) {
        let started = Instant::now();
        let result = self.handler.execute(batch, &self.config.own_sign).await;
        let spend_ms = started.elapsed().as_millis() as u64;
        let count = batch.len() as u64;
        match result {
            Ok(true) => self.statistics.record_success(count, spend_ms),
            Ok(false) => self.statistics.record_fail(count, spend_ms),
            Err(e) => {
                self.statistics.record_fail(count, spend_ms);
                error!("任务执行失败: {}", e);
            }
        }
        // 无论成败都要出运行集，否则排空判定永远不过
        self.queues
            .remove_running(batch, |a, b| self.is_same_unit(a, b))
            .await;
    }

    /// 补充装载待处理队列，返回装载后的队列长度
    ///
    /// 整个流程持装载锁串行执行，休眠也在锁内，保证同一时刻只有
    /// 一个线程在向宿主与任务处理器拉取数据。
    async fn load_more(&self) -> usize {
        let _load = self.queues.lock_load().await;
        let pending = self.queues.pending_len().await;
        if pending > 0 || self.stop.load(Ordering::Acquire) {
            return pending;
        }
        if !self.config.inter_batch_sleep.is_zero() {
            trace!("处理完一批数据后休眠 {:?}", self.config.inter_batch_sleep);
            self.queues.set_sleeping(true);
            self.sleep_or_stop(self.config.inter_batch_sleep).await;
            self.queues.set_sleeping(false);
        }
        // 装载前把运行集快照为疑似重复集，用于跨代重复抑制
        self.queues.snapshot_running_as_repeat().await;
        match self.fetch_into_pending().await {
            Ok(loaded) => self.statistics.record_fetch(loaded as u64),
            Err(e) => {
                error!("获取任务数据错误: {}", e);
                return 0;
            }
        }
        let pending = self.queues.pending_len().await;
        if pending == 0 && self.continue_when_no_data() && !self.config.no_data_sleep.is_zero() {
            debug!("没有读取到需要处理的数据，休眠 {:?}", self.config.no_data_sleep);
            self.queues.set_sleeping(true);
            self.sleep_or_stop(self.config.no_data_sleep).await;
            self.queues.set_sleeping(false);
        }
        pending
    }

    /// 向宿主询问持有的任务项并调用处理器选取任务，返回选取数量
    async fn fetch_into_pending(&self) -> Result<usize> {
        let host = match self.host.upgrade() {
            Some(host) => host,
            None => return Ok(0),
        };
        let owned_items = host.current_task_items().await?;
        if owned_items.is_empty() {
            trace!("没有分配到任务项，跳过本轮选取");
            return Ok(0);
        }
        let units = self
            .handler
            .select_tasks(
                &self.config.task_parameter,
                &self.config.own_sign,
                self.config.task_item_count,
                &owned_items,
                self.config.fetch_batch_size,
            )
            .await?;
        host.mark_fetch_time().await;
        let count = units.len();
        if count > 0 {
            self.queues.push_pending(units).await;
        }
        Ok(count)
    }

    fn continue_when_no_data(&self) -> bool {
        match self.host.upgrade() {
            Some(host) => host.continue_when_no_data(),
            None => false,
        }
    }

    /// 重复判定，每次调用都计入比较次数统计
    fn is_same_unit(&self, a: &H::Unit, b: &H::Unit) -> bool {
        self.statistics.record_compare();
        self.handler.compare(a, b) == std::cmp::Ordering::Equal
    }

    /// 停止通知可中断的休眠
    async fn sleep_or_stop(&self, duration: Duration) {
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
