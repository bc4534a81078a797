use std::cmp::Ordering;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::OwnedTaskItem;

/// 任务处理器的执行能力
///
/// Single模式下处理池的有效批量恒为1，与配置的批量值无关。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteMode {
    Single,
    Batch,
}

/// 用户提供的任务选取与执行契约
///
/// 调度框架只负责分片归属，具体取什么数据、怎么处理由实现方决定。
/// 跨重载代可能出现至多一次的重复投递，实现方需要保证幂等。
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// 任务单元类型，由实现方定义
    type Unit: Clone + Send + Sync + 'static;

    fn execute_mode(&self) -> ExecuteMode;

    /// 按当前持有的任务项选取待处理的任务单元
    ///
    /// `task_item_count` 是该任务类型的分片总数，`owned_items` 是本节点
    /// 当前持有的分片，`fetch_size` 是单次选取的上限。
    async fn select_tasks(
        &self,
        task_parameter: &str,
        own_sign: &str,
        task_item_count: usize,
        owned_items: &[OwnedTaskItem],
        fetch_size: usize,
    ) -> Result<Vec<Self::Unit>>;

    /// 执行任务单元，返回业务层面是否成功
    async fn execute(&self, units: &[Self::Unit], own_sign: &str) -> Result<bool>;

    /// 任务单元全序比较，同时用于重复判定（Equal视为同一任务）
    fn compare(&self, a: &Self::Unit, b: &Self::Unit) -> Ordering;
}
