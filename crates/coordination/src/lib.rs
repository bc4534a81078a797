//! 调度协调协议层
//!
//! 把协调存储原语组合成调度协议：路径布局、无锁选主、
//! 以及覆盖任务类型/服务器/任务项全生命周期的数据管理器。

pub mod leader;
pub mod manager;
pub mod paths;

pub use leader::{elect_leader, is_leader};
pub use manager::{ScheduleDataManager, TaskTypeRunningInfo, RELOAD_VERSION_UNSET};
pub use paths::StorePaths;
