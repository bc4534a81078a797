use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SchedulerError};

/// 缺省的任务变体标识
pub const DEFAULT_OWN_SIGN: &str = "BASE";

/// 组合运行时任务类型名：`{baseTaskType}${ownSign}`
pub fn task_type_of(base_task_type: &str, own_sign: &str) -> String {
    format!("{}${}", base_task_type, own_sign)
}

/// 从运行时任务类型名中拆出基础任务类型
pub fn split_base_task_type(task_type: &str) -> &str {
    match task_type.split_once('$') {
        Some((base, _)) => base,
        None => task_type,
    }
}

/// 从运行时任务类型名中拆出变体标识
pub fn split_own_sign(task_type: &str) -> &str {
    match task_type.split_once('$') {
        Some((_, own_sign)) => own_sign,
        None => DEFAULT_OWN_SIGN,
    }
}

/// 任务类型运行状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskTypeStatus {
    #[default]
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "PAUSED")]
    Paused,
}

/// 任务类型静态配置，由运维方创建一次、所有节点读取
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTypeConfig {
    pub base_task_type: String,
    /// 透传给任务处理器的全局参数
    #[serde(default)]
    pub task_parameter: String,
    /// 任务项定义，支持 `id:{参数}` 形式内嵌单项参数
    #[serde(default)]
    pub task_item_ids: Vec<String>,
    #[serde(default = "default_heart_beat_rate_ms")]
    pub heart_beat_rate_ms: u64,
    /// 判定服务器死亡的心跳周期倍数
    #[serde(default = "default_dead_interval_multiplier")]
    pub dead_interval_multiplier: u32,
    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: usize,
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,
    /// 批量执行时单次提交的任务单元数
    #[serde(default = "default_batch_execute_count")]
    pub batch_execute_count: usize,
    #[serde(default)]
    pub inter_batch_sleep_ms: u64,
    #[serde(default = "default_no_data_sleep_ms")]
    pub no_data_sleep_ms: u64,
    #[serde(default)]
    pub status: TaskTypeStatus,
    /// 非缺省ownSign运行信息的过期天数
    #[serde(default = "default_expire_own_sign_interval")]
    pub expire_own_sign_interval: f64,
}

fn default_heart_beat_rate_ms() -> u64 {
    5000
}

fn default_dead_interval_multiplier() -> u32 {
    12
}

fn default_fetch_batch_size() -> usize {
    500
}

fn default_thread_count() -> usize {
    5
}

fn default_batch_execute_count() -> usize {
    1
}

fn default_no_data_sleep_ms() -> u64 {
    500
}

fn default_expire_own_sign_interval() -> f64 {
    1.0
}

impl TaskTypeConfig {
    pub fn new(base_task_type: impl Into<String>) -> Self {
        Self {
            base_task_type: base_task_type.into(),
            task_parameter: String::new(),
            task_item_ids: Vec::new(),
            heart_beat_rate_ms: default_heart_beat_rate_ms(),
            dead_interval_multiplier: default_dead_interval_multiplier(),
            fetch_batch_size: default_fetch_batch_size(),
            thread_count: default_thread_count(),
            batch_execute_count: default_batch_execute_count(),
            inter_batch_sleep_ms: 0,
            no_data_sleep_ms: default_no_data_sleep_ms(),
            status: TaskTypeStatus::Running,
            expire_own_sign_interval: default_expire_own_sign_interval(),
        }
    }

    pub fn with_task_items(mut self, task_item_ids: Vec<String>) -> Self {
        self.task_item_ids = task_item_ids;
        self
    }

    pub fn with_task_parameter(mut self, task_parameter: impl Into<String>) -> Self {
        self.task_parameter = task_parameter.into();
        self
    }

    pub fn task_type_for(&self, own_sign: &str) -> String {
        task_type_of(&self.base_task_type, own_sign)
    }

    pub fn heart_beat_rate(&self) -> Duration {
        Duration::from_millis(self.heart_beat_rate_ms)
    }

    /// 心跳节点多久未更新视为死亡
    pub fn dead_expire_interval(&self) -> Duration {
        Duration::from_millis(self.heart_beat_rate_ms * u64::from(self.dead_interval_multiplier))
    }

    /// ownSign运行信息的过期时长
    pub fn own_sign_expire_interval(&self) -> Duration {
        Duration::from_secs_f64(self.expire_own_sign_interval * 24.0 * 3600.0)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.status, TaskTypeStatus::Paused)
    }

    /// 创建与更新前的基本校验
    pub fn validate(&self) -> Result<()> {
        if self.base_task_type.is_empty() {
            return Err(SchedulerError::InvalidTaskTypeName {
                name: self.base_task_type.clone(),
                message: "名称不能为空".to_string(),
            });
        }
        if self.base_task_type.contains('$') {
            return Err(SchedulerError::InvalidTaskTypeName {
                name: self.base_task_type.clone(),
                message: "名称不能包含字符'$'".to_string(),
            });
        }
        if self.thread_count == 0 {
            return Err(SchedulerError::Configuration(format!(
                "任务类型 {} 的处理线程数必须大于0",
                self.base_task_type
            )));
        }
        if self.heart_beat_rate_ms == 0 {
            return Err(SchedulerError::Configuration(format!(
                "任务类型 {} 的心跳间隔必须大于0",
                self.base_task_type
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_split_helpers() {
        assert_eq!(task_type_of("orderJob", "BASE"), "orderJob$BASE");
        assert_eq!(split_base_task_type("orderJob$tenantA"), "orderJob");
        assert_eq!(split_own_sign("orderJob$tenantA"), "tenantA");
        assert_eq!(split_base_task_type("orderJob"), "orderJob");
        assert_eq!(split_own_sign("orderJob"), DEFAULT_OWN_SIGN);
    }

    #[test]
    fn test_defaults() {
        let config = TaskTypeConfig::new("orderJob");
        assert_eq!(config.heart_beat_rate_ms, 5000);
        assert_eq!(config.dead_interval_multiplier, 12);
        assert_eq!(
            config.dead_expire_interval(),
            Duration::from_millis(60_000)
        );
        assert_eq!(config.status, TaskTypeStatus::Running);
        assert!(!config.is_paused());
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let mut config = TaskTypeConfig::new("orderJob");
        config.status = TaskTypeStatus::Paused;
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"status\":\"PAUSED\""));
        assert!(json.contains("\"baseTaskType\":\"orderJob\""));
    }

    #[test]
    fn test_validate_rejects_dollar_sign() {
        let config = TaskTypeConfig::new("order$Job");
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidTaskTypeName { .. }
        ));
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let mut config = TaskTypeConfig::new("orderJob");
        config.thread_count = 0;
        assert!(config.validate().is_err());
    }
}
