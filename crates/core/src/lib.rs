pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::{AppConfig, CoordinationConfig, EmbeddedConfig, NodeConfig};
pub use errors::*;
pub use models::{
    generate_factory_id, random_uuid_hex, split_base_task_type, split_own_sign, task_type_of,
    OwnedTaskItem, ScheduleServer, StatisticsInfo, StatisticsSnapshot, TaskItem, TaskItemStatus,
    TaskTypeConfig, TaskTypeStatus, DEFAULT_OWN_SIGN,
};
pub use traits::{CoordinationStore, ExecuteMode, NodeRecord, TaskHandler};
