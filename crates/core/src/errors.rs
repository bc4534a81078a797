use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("协调存储错误: {0}")]
    Storage(String),

    #[error("协调存储节点不存在: {path}")]
    NodeMissing { path: String },

    #[error("协调存储节点已存在: {path}")]
    NodeExists { path: String },

    #[error("协调存储版本冲突: {path}")]
    VersionConflict { path: String },

    #[error("任务类型未找到: {base_task_type}")]
    TaskTypeNotFound { base_task_type: String },

    #[error("任务类型已存在: {base_task_type}")]
    TaskTypeExists { base_task_type: String },

    #[error("非法的任务类型名称: {name} - {message}")]
    InvalidTaskTypeName { name: String, message: String },

    #[error("调度服务器重复注册: {uuid}")]
    AlreadyRegistered { uuid: String },

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("功能未实现: {0}")]
    NotImplemented(&'static str),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, SchedulerError>;
