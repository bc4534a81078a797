pub mod server;
pub mod statistics;
pub mod task_item;
pub mod task_type;
pub mod time_format;

pub use server::{generate_factory_id, random_uuid_hex, ScheduleServer};
pub use statistics::{StatisticsInfo, StatisticsSnapshot};
pub use task_item::{OwnedTaskItem, TaskItem, TaskItemStatus};
pub use task_type::{
    split_base_task_type, split_own_sign, task_type_of, TaskTypeConfig, TaskTypeStatus,
    DEFAULT_OWN_SIGN,
};
