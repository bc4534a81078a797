use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::sections::{CoordinationConfig, EmbeddedConfig, NodeConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub coordination: CoordinationConfig,
    pub node: NodeConfig,
    pub embedded: EmbeddedConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            coordination: CoordinationConfig {
                root_path: "/taskshard".to_string(),
            },
            node: NodeConfig {
                ip: "127.0.0.1".to_string(),
                host_name: None,
            },
            embedded: EmbeddedConfig {
                node_count: 2,
                base_task_type: "demoType".to_string(),
                task_item_count: 4,
                heart_beat_rate_ms: 1000,
                thread_count: 2,
                fetch_batch_size: 50,
            },
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/taskshard.toml",
                "taskshard.toml",
                "/etc/taskshard/config.toml",
            ];

            let mut config_file_found = false;
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    config_file_found = true;
                    break;
                }
            }

            if !config_file_found {
                builder = builder
                    .set_default("coordination.root_path", "/taskshard")?
                    .set_default("node.ip", "127.0.0.1")?
                    .set_default("embedded.node_count", 2)?
                    .set_default("embedded.base_task_type", "demoType")?
                    .set_default("embedded.task_item_count", 4)?
                    .set_default("embedded.heart_beat_rate_ms", 1000)?
                    .set_default("embedded.thread_count", 2)?
                    .set_default("embedded.fetch_batch_size", 50)?;
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("TASKSHARD")
                .separator("_")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.coordination
            .validate()
            .context("协调存储配置验证失败")?;

        self.node.validate().context("节点配置验证失败")?;

        self.embedded.validate().context("内嵌集群配置验证失败")?;

        Ok(())
    }
}
