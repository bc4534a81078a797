use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use taskshard_core::{ExecuteMode, OwnedTaskItem, Result, TaskHandler};
use tracing::debug;

/// 演示用任务处理器
///
/// 对每个持有的任务项持续生成形如 `item#序号` 的任务单元，
/// 执行时仅模拟少量耗时并计数，用于观察分片调度的收敛与迁移。
pub struct SampleTaskHandler {
    /// 每个任务项单次选取生成的单元数
    units_per_item: usize,
    /// 单个批次的模拟处理耗时
    simulated_work: Duration,
    sequence: AtomicU64,
    executed: AtomicU64,
}

impl SampleTaskHandler {
    pub fn new(units_per_item: usize, simulated_work: Duration) -> Self {
        Self {
            units_per_item: units_per_item.max(1),
            simulated_work,
            sequence: AtomicU64::new(0),
            executed: AtomicU64::new(0),
        }
    }

    /// 累计执行过的任务单元数
    pub fn executed_count(&self) -> u64 {
        self.executed.load(AtomicOrdering::Relaxed)
    }
}

impl Default for SampleTaskHandler {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(20))
    }
}

#[async_trait]
impl TaskHandler for SampleTaskHandler {
    type Unit = String;

    fn execute_mode(&self) -> ExecuteMode {
        ExecuteMode::Batch
    }

    async fn select_tasks(
        &self,
        _task_parameter: &str,
        _own_sign: &str,
        _task_item_count: usize,
        owned_items: &[OwnedTaskItem],
        fetch_size: usize,
    ) -> Result<Vec<String>> {
        let mut units = Vec::new();
        'outer: for _ in 0..self.units_per_item {
            for item in owned_items {
                if units.len() >= fetch_size {
                    break 'outer;
                }
                let seq = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
                units.push(format!("{}#{}", item.item_id, seq));
            }
        }
        Ok(units)
    }

    async fn execute(&self, units: &[String], own_sign: &str) -> Result<bool> {
        if !self.simulated_work.is_zero() {
            tokio::time::sleep(self.simulated_work).await;
        }
        let total = self.executed.fetch_add(units.len() as u64, AtomicOrdering::Relaxed)
            + units.len() as u64;
        debug!(
            "处理任务单元 {} 个 [ownSign={}], 累计 {}",
            units.len(),
            own_sign,
            total
        );
        Ok(true)
    }

    fn compare(&self, a: &String, b: &String) -> Ordering {
        a.cmp(b)
    }
}
