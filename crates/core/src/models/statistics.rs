use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 调度统计计数器
///
/// 处理线程与心跳线程共享同一份计数器，只做累加，无跨字段一致性要求。
#[derive(Debug, Default)]
pub struct StatisticsInfo {
    /// 拉取数据的轮次
    fetch_rounds: AtomicU64,
    /// 拉取到的任务单元总数
    fetched_units: AtomicU64,
    success_units: AtomicU64,
    fail_units: AtomicU64,
    /// 任务执行累计耗时（毫秒）
    execute_spend_ms: AtomicU64,
    /// 重复判定比较器的调用次数
    compare_count: AtomicU64,
}

impl StatisticsInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch(&self, unit_count: u64) {
        self.fetch_rounds.fetch_add(1, Ordering::Relaxed);
        self.fetched_units.fetch_add(unit_count, Ordering::Relaxed);
    }

    pub fn record_success(&self, unit_count: u64, spend_ms: u64) {
        self.success_units.fetch_add(unit_count, Ordering::Relaxed);
        self.execute_spend_ms.fetch_add(spend_ms, Ordering::Relaxed);
    }

    pub fn record_fail(&self, unit_count: u64, spend_ms: u64) {
        self.fail_units.fetch_add(unit_count, Ordering::Relaxed);
        self.execute_spend_ms.fetch_add(spend_ms, Ordering::Relaxed);
    }

    pub fn record_compare(&self) {
        self.compare_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            fetch_rounds: self.fetch_rounds.load(Ordering::Relaxed),
            fetched_units: self.fetched_units.load(Ordering::Relaxed),
            success_units: self.success_units.load(Ordering::Relaxed),
            fail_units: self.fail_units.load(Ordering::Relaxed),
            execute_spend_ms: self.execute_spend_ms.load(Ordering::Relaxed),
            compare_count: self.compare_count.load(Ordering::Relaxed),
        }
    }
}

/// 统计计数器的一致性无关快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub fetch_rounds: u64,
    pub fetched_units: u64,
    pub success_units: u64,
    pub fail_units: u64,
    pub execute_spend_ms: u64,
    pub compare_count: u64,
}

impl fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetchRounds={},fetchedUnits={},successUnits={},failUnits={},spendMs={},compareCount={}",
            self.fetch_rounds,
            self.fetched_units,
            self.success_units,
            self.fail_units,
            self.execute_spend_ms,
            self.compare_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = StatisticsInfo::new();
        stats.record_fetch(10);
        stats.record_fetch(0);
        stats.record_success(8, 120);
        stats.record_fail(2, 30);
        stats.record_compare();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.fetch_rounds, 2);
        assert_eq!(snapshot.fetched_units, 10);
        assert_eq!(snapshot.success_units, 8);
        assert_eq!(snapshot.fail_units, 2);
        assert_eq!(snapshot.execute_spend_ms, 150);
        assert_eq!(snapshot.compare_count, 1);
    }

    #[test]
    fn test_summary_line() {
        let stats = StatisticsInfo::new();
        stats.record_fetch(3);
        let line = stats.snapshot().to_string();
        assert!(line.contains("fetchRounds=1"));
        assert!(line.contains("fetchedUnits=3"));
    }
}
