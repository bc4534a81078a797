use anyhow::Result;
use serde::{Deserialize, Serialize};

/// 协调存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// 存储命名空间根路径，形如 `/taskshard`
    pub root_path: String,
}

impl CoordinationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.root_path.is_empty() {
            return Err(anyhow::anyhow!("根路径不能为空"));
        }
        if !self.root_path.starts_with('/') {
            return Err(anyhow::anyhow!("根路径必须以'/'开头: {}", self.root_path));
        }
        if self.root_path.len() > 1 && self.root_path.ends_with('/') {
            return Err(anyhow::anyhow!("根路径不能以'/'结尾: {}", self.root_path));
        }
        if self.root_path.contains('$') {
            return Err(anyhow::anyhow!("根路径不能包含字符'$': {}", self.root_path));
        }
        Ok(())
    }
}

/// 本机节点身份配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub ip: String,
    /// 省略时自动探测本机主机名
    #[serde(default)]
    pub host_name: Option<String>,
}

impl NodeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ip.is_empty() {
            return Err(anyhow::anyhow!("节点IP不能为空"));
        }
        Ok(())
    }

    /// 解析主机名，配置缺省时探测本机
    pub fn resolve_host_name(&self) -> String {
        match &self.host_name {
            Some(name) => name.clone(),
            None => hostname::get()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "localhost".to_string()),
        }
    }
}

/// 内嵌演示集群配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedConfig {
    /// 同进程内启动的调度节点数
    pub node_count: usize,
    pub base_task_type: String,
    pub task_item_count: usize,
    pub heart_beat_rate_ms: u64,
    pub thread_count: usize,
    pub fetch_batch_size: usize,
}

impl EmbeddedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.node_count == 0 {
            return Err(anyhow::anyhow!("节点数必须大于0"));
        }
        if self.base_task_type.is_empty() {
            return Err(anyhow::anyhow!("演示任务类型名不能为空"));
        }
        if self.base_task_type.contains('$') {
            return Err(anyhow::anyhow!(
                "演示任务类型名不能包含字符'$': {}",
                self.base_task_type
            ));
        }
        if self.task_item_count == 0 {
            return Err(anyhow::anyhow!("任务项数必须大于0"));
        }
        if self.thread_count == 0 {
            return Err(anyhow::anyhow!("处理线程数必须大于0"));
        }
        if self.heart_beat_rate_ms == 0 {
            return Err(anyhow::anyhow!("心跳间隔必须大于0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordination_validate() {
        let good = CoordinationConfig {
            root_path: "/taskshard".to_string(),
        };
        assert!(good.validate().is_ok());

        let relative = CoordinationConfig {
            root_path: "taskshard".to_string(),
        };
        assert!(relative.validate().is_err());

        let trailing = CoordinationConfig {
            root_path: "/taskshard/".to_string(),
        };
        assert!(trailing.validate().is_err());

        let dollar = CoordinationConfig {
            root_path: "/task$shard".to_string(),
        };
        assert!(dollar.validate().is_err());
    }

    #[test]
    fn test_node_resolve_host_name_prefers_config() {
        let node = NodeConfig {
            ip: "10.0.0.1".to_string(),
            host_name: Some("configured".to_string()),
        };
        assert_eq!(node.resolve_host_name(), "configured");

        let auto = NodeConfig {
            ip: "10.0.0.1".to_string(),
            host_name: None,
        };
        assert!(!auto.resolve_host_name().is_empty());
    }
}
