use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use taskshard_coordination::ScheduleDataManager;
use taskshard_core::{AppConfig, EmbeddedConfig, TaskTypeConfig, DEFAULT_OWN_SIGN};
use taskshard_infrastructure::MemoryCoordinationStore;
use taskshard_node::{NodeIdentity, NodeOrchestrator};
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::sample::SampleTaskHandler;

/// 集群状态日志的输出间隔
const STATISTICS_INTERVAL: Duration = Duration::from_secs(5);

/// 主应用程序
///
/// 在单进程内启动一个内存协调存储和若干调度节点，节点之间只通过
/// 存储协调，用于演示与验证分片调度协议。
pub struct Application {
    config: AppConfig,
    data_manager: ScheduleDataManager,
    handler: Arc<SampleTaskHandler>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化内嵌演示集群, 节点数: {}", config.embedded.node_count);

        let store = Arc::new(MemoryCoordinationStore::new());
        let data_manager = ScheduleDataManager::new(store, &config.coordination.root_path)
            .await
            .context("初始化协调数据管理器失败")?;

        // 创建演示任务类型，任务项子树由第一个领导者初始化
        let task_config = build_demo_task_type(&config.embedded);
        data_manager
            .create_base_task_type(&task_config)
            .await
            .context("创建演示任务类型失败")?;
        info!(
            "创建演示任务类型 {}, 任务项 {} 个",
            task_config.base_task_type,
            task_config.task_item_ids.len()
        );

        let handler = Arc::new(SampleTaskHandler::default());

        Ok(Self {
            config,
            data_manager,
            handler,
        })
    }

    /// 协调数据访问层，供外部观察集群状态
    pub fn data_manager(&self) -> &ScheduleDataManager {
        &self.data_manager
    }

    /// 演示任务处理器
    pub fn handler(&self) -> &Arc<SampleTaskHandler> {
        &self.handler
    }

    /// 运行应用程序
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let node_count = self.config.embedded.node_count;
        let base_task_type = self.config.embedded.base_task_type.clone();
        info!("启动内嵌演示集群: {} 个调度节点", node_count);

        // 启动调度节点，每个节点一份独立的工厂身份
        let host_name = self.config.node.resolve_host_name();
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let identity = NodeIdentity::new(&self.config.node.ip, &host_name);
            let node = NodeOrchestrator::start(
                self.data_manager.clone(),
                &identity,
                &base_task_type,
                DEFAULT_OWN_SIGN,
                Arc::clone(&self.handler),
            )
            .await
            .context("启动调度节点失败")?;
            nodes.push(Arc::new(node));
        }

        // 启动集群状态日志任务
        let statistics_handle = {
            let nodes = nodes.clone();
            let handler = Arc::clone(&self.handler);
            let shutdown_rx = shutdown_rx.resubscribe();

            tokio::spawn(async move {
                run_statistics_loop(nodes, handler, shutdown_rx).await;
            })
        };

        // 等待关闭信号
        let _ = shutdown_rx.recv().await;
        info!("内嵌演示集群收到关闭信号");

        // 停止所有调度节点
        for node in &nodes {
            if let Err(e) = node.stop().await {
                error!("停止调度节点失败: {}", e);
            }
        }

        let _ = statistics_handle.await;

        info!("内嵌演示集群已停止");
        Ok(())
    }
}

/// 根据内嵌集群配置构造演示任务类型
fn build_demo_task_type(embedded: &EmbeddedConfig) -> TaskTypeConfig {
    let task_item_ids = (0..embedded.task_item_count)
        .map(|i| i.to_string())
        .collect();

    let mut config =
        TaskTypeConfig::new(&embedded.base_task_type).with_task_items(task_item_ids);
    config.heart_beat_rate_ms = embedded.heart_beat_rate_ms;
    config.thread_count = embedded.thread_count;
    config.fetch_batch_size = embedded.fetch_batch_size;
    config.batch_execute_count = 5;
    config
}

/// 周期输出各节点的分片持有情况与处理统计
async fn run_statistics_loop(
    nodes: Vec<Arc<NodeOrchestrator<SampleTaskHandler>>>,
    handler: Arc<SampleTaskHandler>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(STATISTICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                log_cluster_status(&nodes, &handler).await;
            }
            _ = shutdown_rx.recv() => {
                info!("集群状态日志收到关闭信号");
                break;
            }
        }
    }
}

async fn log_cluster_status(
    nodes: &[Arc<NodeOrchestrator<SampleTaskHandler>>],
    handler: &SampleTaskHandler,
) {
    for node in nodes {
        let uuid = node.server_uuid().await;
        let state = node.state().await;
        let items = node.owned_task_items().await;
        let item_ids: Vec<&str> = items.iter().map(|item| item.item_id.as_str()).collect();
        info!(
            "节点 {} [{}] 任务项[{}] {}",
            uuid,
            state,
            item_ids.join(","),
            node.statistics()
        );
    }
    info!("集群累计处理任务单元: {}", handler.executed_count());
}
