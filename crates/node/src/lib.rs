//! 调度节点层
//!
//! 编排器负责节点生命周期（注册、心跳、重平衡、重载），处理池
//! 负责任务单元的认领与并发执行，两者通过窄接口 `PoolHost` 衔接。

pub mod orchestrator;
pub mod pool;
pub mod queues;

pub use orchestrator::{NodeIdentity, NodeOrchestrator, NodeState};
pub use pool::{PoolConfig, PoolHost, WorkerPool};
pub use queues::WorkQueues;
