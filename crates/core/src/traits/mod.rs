pub mod store;
pub mod task_handler;

pub use store::{CoordinationStore, NodeRecord};
pub use task_handler::{ExecuteMode, TaskHandler};
