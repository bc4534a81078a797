use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SchedulerError;

/// 任务项（分片）状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskItemStatus {
    #[default]
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "PAUSED")]
    Paused,
}

impl TaskItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskItemStatus::Active => "ACTIVE",
            TaskItemStatus::Paused => "PAUSED",
        }
    }
}

impl fmt::Display for TaskItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskItemStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(TaskItemStatus::Active),
            "PAUSED" => Ok(TaskItemStatus::Paused),
            other => Err(SchedulerError::Internal(format!(
                "未知的任务项状态: {}",
                other
            ))),
        }
    }
}

/// 任务项（分片）完整视图，从存储的子节点树装配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub base_task_type: String,
    pub task_type: String,
    pub own_sign: String,
    pub item_id: String,
    #[serde(default)]
    pub deal_parameter: String,
    #[serde(default)]
    pub status: TaskItemStatus,
    pub current_server: Option<String>,
    pub request_server: Option<String>,
    #[serde(default)]
    pub deal_desc: String,
}

/// 节点当前持有的任务项快照，传递给任务处理器做数据选取
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedTaskItem {
    pub item_id: String,
    #[serde(default)]
    pub deal_parameter: String,
}

impl OwnedTaskItem {
    pub fn new(item_id: impl Into<String>, deal_parameter: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            deal_parameter: deal_parameter.into(),
        }
    }
}
