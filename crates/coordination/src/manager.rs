//! 调度协调数据管理器
//!
//! 封装协调存储之上的全部调度协议操作：任务类型生命周期、服务器注册与
//! 心跳刷新、任务项（分片）的初始化/分配/交接、重载版本通知、暂停与恢复。
//!
//! 协议不依赖分布式锁：所有节点对同一份存储状态做幂等的重复计算，
//! 领导者负责写入分配结果，非领导者只读取属于自己的部分。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use taskshard_core::{
    random_uuid_hex, split_base_task_type, split_own_sign, task_type_of, CoordinationStore,
    OwnedTaskItem, Result, ScheduleServer, SchedulerError, TaskItem, TaskItemStatus,
    TaskTypeConfig, TaskTypeStatus, DEFAULT_OWN_SIGN,
};

use crate::leader;
use crate::paths::{
    raw_suffix, split_task_item_define, StorePaths, LEAF_CUR_SERVER, LEAF_DEAL_DESC,
    LEAF_PARAMETER, LEAF_REQ_SERVER, LEAF_STS,
};

/// 重载版本缓存的未初始化哨兵值，恒小于存储里的任何真实版本
pub const RELOAD_VERSION_UNSET: i64 = -1;

/// 任务类型运行时概览（一个ownSign一条）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTypeRunningInfo {
    pub base_task_type: String,
    pub task_type: String,
    pub own_sign: String,
}

/// 服务器查询的排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerOrderField {
    TaskType,
    OwnSign,
    RegisterTime,
    HeartbeatTime,
    Ip,
    ManagerFactory,
}

impl ServerOrderField {
    /// 解析逗号分隔的排序串，未知字段名被忽略；None时使用缺省顺序
    fn parse_order(order: Option<&str>) -> Vec<ServerOrderField> {
        let text = order.unwrap_or("TASK_TYPE,OWN_SIGN,REGISTER_TIME,HEARTBEAT_TIME,IP");
        text.split(',')
            .filter_map(|name| match name.trim().to_uppercase().as_str() {
                "TASK_TYPE" => Some(ServerOrderField::TaskType),
                "OWN_SIGN" => Some(ServerOrderField::OwnSign),
                "REGISTER_TIME" => Some(ServerOrderField::RegisterTime),
                "HEARTBEAT_TIME" => Some(ServerOrderField::HeartbeatTime),
                "IP" => Some(ServerOrderField::Ip),
                "MANAGER_FACTORY" => Some(ServerOrderField::ManagerFactory),
                _ => None,
            })
            .collect()
    }

    fn compare(fields: &[ServerOrderField], a: &ScheduleServer, b: &ScheduleServer) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        for field in fields {
            let result = match field {
                ServerOrderField::TaskType => a.task_type.cmp(&b.task_type),
                ServerOrderField::OwnSign => a.own_sign.cmp(&b.own_sign),
                ServerOrderField::RegisterTime => a.register_time.cmp(&b.register_time),
                ServerOrderField::HeartbeatTime => a.heart_beat_time.cmp(&b.heart_beat_time),
                ServerOrderField::Ip => a.ip.cmp(&b.ip),
                ServerOrderField::ManagerFactory => {
                    a.manager_factory_id.cmp(&b.manager_factory_id)
                }
            };
            if result != Ordering::Equal {
                return result;
            }
        }
        std::cmp::Ordering::Equal
    }
}

/// 协调存储之上的调度数据访问层
#[derive(Clone)]
pub struct ScheduleDataManager {
    store: Arc<dyn CoordinationStore>,
    paths: StorePaths,
}

impl ScheduleDataManager {
    /// 创建管理器并确保基础目录存在
    pub async fn new(store: Arc<dyn CoordinationStore>, root_path: &str) -> Result<Self> {
        let manager = Self {
            store,
            paths: StorePaths::new(root_path),
        };
        manager.ensure_path(&manager.paths.base_task_type_root()).await?;
        Ok(manager)
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    /// 逐段创建缺失的祖先与节点本身，已存在的节点跳过
    async fn ensure_path(&self, path: &str) -> Result<()> {
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            match self.store.create(&current, None).await {
                Ok(()) => {}
                Err(SchedulerError::NodeExists { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// 读取节点文本负载；节点缺失或负载为空时返回None
    async fn read_text(&self, path: &str) -> Result<Option<String>> {
        Ok(self
            .store
            .read(path)
            .await?
            .and_then(|record| record.text())
            .filter(|text| !text.is_empty()))
    }

    // ------------------------------------------------------------------
    // 任务类型生命周期
    // ------------------------------------------------------------------

    /// 创建任务类型配置；名称含`$`或已存在时拒绝
    pub async fn create_base_task_type(&self, config: &TaskTypeConfig) -> Result<()> {
        config.validate()?;
        let path = self.paths.task_type_config(&config.base_task_type);
        if self.store.exists(&path).await? {
            return Err(SchedulerError::TaskTypeExists {
                base_task_type: config.base_task_type.clone(),
            });
        }
        let payload = serde_json::to_vec(config)?;
        self.store.create(&path, Some(&payload)).await?;
        Ok(())
    }

    /// 更新任务类型配置，不存在时创建
    pub async fn update_base_task_type(&self, config: &TaskTypeConfig) -> Result<()> {
        config.validate()?;
        let path = self.paths.task_type_config(&config.base_task_type);
        let payload = serde_json::to_vec(config)?;
        if self.store.exists(&path).await? {
            self.store.write(&path, Some(&payload), None).await?;
        } else {
            self.store.create(&path, Some(&payload)).await?;
        }
        Ok(())
    }

    /// 读取任务类型配置；不存在时返回None
    pub async fn load_task_type_config(&self, base_task_type: &str) -> Result<Option<TaskTypeConfig>> {
        let path = self.paths.task_type_config(base_task_type);
        match self.store.read(&path).await? {
            Some(record) => match record.data {
                Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// 读取所有任务类型配置，按名称排序
    pub async fn load_all_task_type_config(&self) -> Result<Vec<TaskTypeConfig>> {
        let root = self.paths.base_task_type_root();
        let mut names = self.store.list_children(&root).await?;
        names.sort();
        let mut result = Vec::with_capacity(names.len());
        for name in names {
            if let Some(config) = self.load_task_type_config(&name).await? {
                result.push(config);
            }
        }
        Ok(result)
    }

    /// 删除任务类型的全部数据（配置与运行时）
    pub async fn delete_task_type(&self, base_task_type: &str) -> Result<()> {
        self.store
            .delete_subtree(&self.paths.task_type_config(base_task_type))
            .await
    }

    /// 清除任务类型的全部运行时信息，保留配置节点
    pub async fn clear_task_type(&self, base_task_type: &str) -> Result<()> {
        let config_path = self.paths.task_type_config(base_task_type);
        for name in self.store.list_children(&config_path).await? {
            self.store
                .delete_subtree(&format!("{}/{}", config_path, name))
                .await?;
        }
        Ok(())
    }

    /// 枚举任务类型的运行时概览，按taskType名排序
    pub async fn load_all_task_type_running_info(
        &self,
        base_task_type: &str,
    ) -> Result<Vec<TaskTypeRunningInfo>> {
        let config_path = self.paths.task_type_config(base_task_type);
        if !self.store.exists(&config_path).await? {
            return Ok(Vec::new());
        }
        let mut names = self.store.list_children(&config_path).await?;
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| TaskTypeRunningInfo {
                base_task_type: base_task_type.to_string(),
                own_sign: split_own_sign(&name).to_string(),
                task_type: name,
            })
            .collect())
    }

    /// 清除过期的非缺省ownSign运行时信息，返回清除数量。
    /// 分片根节点由领导者心跳周期性回写标记，活跃运行时不会过期。
    pub async fn clear_expire_task_type_running_info(
        &self,
        base_task_type: &str,
        expire: Duration,
    ) -> Result<usize> {
        let config_path = self.paths.task_type_config(base_task_type);
        if !self.store.exists(&config_path).await? {
            return Ok(0);
        }
        let expire = chrono::Duration::milliseconds(expire.as_millis() as i64);
        let now = Utc::now();
        let mut removed = 0;
        for name in self.store.list_children(&config_path).await? {
            if split_own_sign(&name) == DEFAULT_OWN_SIGN {
                continue;
            }
            let marker_path = self.paths.task_item_root(&name);
            let expired = match self.store.read(&marker_path).await? {
                Some(record) => now - record.modified_at > expire,
                // 分片根尚未初始化（注册先于领导者初始化），按运行时根节点的年龄判定
                None => match self.store.read(&self.paths.runtime(&name)).await? {
                    Some(record) => now - record.modified_at > expire,
                    None => false,
                },
            };
            if expired {
                self.store
                    .delete_subtree(&format!("{}/{}", config_path, name))
                    .await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // 运行时初始化
    // ------------------------------------------------------------------

    /// 领导者专用：删除并按配置重建任务项子树，随后写入初始化成功标记
    pub async fn initialize_running_info(
        &self,
        base_task_type: &str,
        own_sign: &str,
        leader_uuid: &str,
    ) -> Result<()> {
        let task_type = task_type_of(base_task_type, own_sign);
        let item_root = self.paths.task_item_root(&task_type);
        self.store.delete_subtree(&item_root).await?;
        self.ensure_path(&item_root).await?;

        let config = self
            .load_task_type_config(base_task_type)
            .await?
            .ok_or_else(|| SchedulerError::TaskTypeNotFound {
                base_task_type: base_task_type.to_string(),
            })?;
        self.create_schedule_task_items(base_task_type, own_sign, &config.task_item_ids)
            .await?;
        self.set_initial_running_info_success(base_task_type, &task_type, leader_uuid)
            .await?;
        Ok(())
    }

    /// 把初始化成功标记（领导者uuid）写入分片根节点
    pub async fn set_initial_running_info_success(
        &self,
        _base_task_type: &str,
        task_type: &str,
        leader_uuid: &str,
    ) -> Result<()> {
        let item_root = self.paths.task_item_root(task_type);
        self.store
            .write(&item_root, Some(leader_uuid.as_bytes()), None)
            .await?;
        Ok(())
    }

    /// 判断运行时是否初始化完成：存储的标记必须等于当前计算出的领导者
    pub async fn is_initial_running_info_success(
        &self,
        base_task_type: &str,
        own_sign: &str,
    ) -> Result<bool> {
        let task_type = task_type_of(base_task_type, own_sign);
        let names = self.load_schedule_server_names(&task_type).await?;
        let leader = match leader::elect_leader(names.iter().map(String::as_str)) {
            Some(leader) => leader.to_string(),
            None => return Ok(false),
        };
        Ok(self
            .read_text(&self.paths.task_item_root(&task_type))
            .await?
            .map(|marker| marker == leader)
            .unwrap_or(false))
    }

    // ------------------------------------------------------------------
    // 任务项（分片）
    // ------------------------------------------------------------------

    /// 按定义创建任务项子树。定义支持 `id:{参数}` 内嵌单项参数
    pub async fn create_schedule_task_items(
        &self,
        base_task_type: &str,
        own_sign: &str,
        definitions: &[String],
    ) -> Result<()> {
        let task_type = task_type_of(base_task_type, own_sign);
        let item_root = self.paths.task_item_root(&task_type);
        self.ensure_path(&item_root).await?;

        for definition in definitions {
            let (item_id, parameter) = split_task_item_define(definition);
            let item_path = format!("{}/{}", item_root, item_id);
            self.store.create(&item_path, None).await?;
            self.store
                .create(&format!("{}/{}", item_path, LEAF_CUR_SERVER), None)
                .await?;
            self.store
                .create(&format!("{}/{}", item_path, LEAF_REQ_SERVER), None)
                .await?;
            self.store
                .create(
                    &format!("{}/{}", item_path, LEAF_STS),
                    Some(TaskItemStatus::Active.as_str().as_bytes()),
                )
                .await?;
            let parameter_payload = if parameter.is_empty() {
                None
            } else {
                Some(parameter.as_bytes().to_vec())
            };
            self.store
                .create(
                    &format!("{}/{}", item_path, LEAF_PARAMETER),
                    parameter_payload.as_deref(),
                )
                .await?;
            self.store
                .create(&format!("{}/{}", item_path, LEAF_DEAL_DESC), None)
                .await?;
        }
        Ok(())
    }

    /// 更新任务项状态与处理描述；任务项不存在时静默跳过
    pub async fn update_schedule_task_item_status(
        &self,
        task_type: &str,
        item_id: &str,
        status: TaskItemStatus,
        message: Option<&str>,
    ) -> Result<()> {
        let sts_path = self.paths.task_item_leaf(task_type, item_id, LEAF_STS);
        if self.store.exists(&sts_path).await? {
            self.store
                .write(&sts_path, Some(status.as_str().as_bytes()), None)
                .await?;
        }
        let desc_path = self.paths.task_item_leaf(task_type, item_id, LEAF_DEAL_DESC);
        if self.store.exists(&desc_path).await? {
            let message = message.unwrap_or("");
            self.store
                .write(&desc_path, Some(message.as_bytes()), None)
                .await?;
        }
        Ok(())
    }

    /// 删除单个任务项
    pub async fn delete_schedule_task_item(&self, task_type: &str, item_id: &str) -> Result<()> {
        self.store
            .delete_subtree(&self.paths.task_item(task_type, item_id))
            .await
    }

    /// 读取全部任务项视图，按任务项编号排序；运行时未初始化时返回空
    pub async fn load_all_task_item(&self, task_type: &str) -> Result<Vec<TaskItem>> {
        let item_root = self.paths.task_item_root(task_type);
        if !self.store.exists(&item_root).await? {
            return Ok(Vec::new());
        }
        let mut names = self.store.list_children(&item_root).await?;
        names.sort();

        let mut result = Vec::with_capacity(names.len());
        for name in names {
            let status = match self
                .read_text(&self.paths.task_item_leaf(task_type, &name, LEAF_STS))
                .await?
            {
                Some(text) => text.parse::<TaskItemStatus>()?,
                None => TaskItemStatus::default(),
            };
            result.push(TaskItem {
                base_task_type: split_base_task_type(task_type).to_string(),
                task_type: task_type.to_string(),
                own_sign: split_own_sign(task_type).to_string(),
                current_server: self
                    .read_text(&self.paths.task_item_leaf(task_type, &name, LEAF_CUR_SERVER))
                    .await?,
                request_server: self
                    .read_text(&self.paths.task_item_leaf(task_type, &name, LEAF_REQ_SERVER))
                    .await?,
                deal_parameter: self
                    .read_text(&self.paths.task_item_leaf(task_type, &name, LEAF_PARAMETER))
                    .await?
                    .unwrap_or_default(),
                deal_desc: self
                    .read_text(&self.paths.task_item_leaf(task_type, &name, LEAF_DEAL_DESC))
                    .await?
                    .unwrap_or_default(),
                status,
                item_id: name,
            });
        }
        Ok(result)
    }

    /// 任务项总数；运行时未初始化时为0
    pub async fn query_task_item_count(&self, task_type: &str) -> Result<usize> {
        let item_root = self.paths.task_item_root(task_type);
        if !self.store.exists(&item_root).await? {
            return Ok(0);
        }
        Ok(self.store.list_children(&item_root).await?.len())
    }

    // ------------------------------------------------------------------
    // 重载版本
    // ------------------------------------------------------------------

    /// 通知所有服务器重新装载任务项：向服务器注册区根节点写入固定负载，
    /// 使其版本号自增。返回新版本
    pub async fn update_reload_task_item_flag(&self, task_type: &str) -> Result<i64> {
        let server_root = self.paths.server_root(task_type);
        self.store
            .write(&server_root, Some(b"reload=true"), None)
            .await
    }

    /// 读取当前重载版本（服务器注册区根节点的版本号）
    pub async fn get_reload_task_item_flag(&self, task_type: &str) -> Result<i64> {
        let server_root = self.paths.server_root(task_type);
        match self.store.read(&server_root).await? {
            Some(record) => Ok(record.version),
            None => Err(SchedulerError::NodeMissing { path: server_root }),
        }
    }

    // ------------------------------------------------------------------
    // 服务器注册与查询
    // ------------------------------------------------------------------

    /// 注册调度服务器：创建顺序节点并写入JSON记录。
    /// 成功后 `server.uuid` 为存储分配的节点名，`registered` 置位
    pub async fn register_schedule_server(&self, server: &mut ScheduleServer) -> Result<()> {
        if server.is_registered() {
            return Err(SchedulerError::AlreadyRegistered {
                uuid: server.uuid.clone(),
            });
        }
        let server_root = self.paths.server_root(&server.task_type);
        self.ensure_path(&server_root).await?;

        // uuid段保证节点名全局唯一，序号段用于选主
        let prefix = format!(
            "{}/{}${}${}$",
            server_root,
            server.task_type,
            server.ip,
            random_uuid_hex()
        );
        let real_path = self.store.create_sequential(&prefix, None).await?;
        server.uuid = real_path
            .rsplit('/')
            .next()
            .unwrap_or(real_path.as_str())
            .to_string();
        server.heart_beat_time = Utc::now();

        let payload = serde_json::to_vec(&*server)?;
        self.store.write(&real_path, Some(&payload), None).await?;
        server.registered = true;
        Ok(())
    }

    /// 回写心跳：刷新心跳时间与版本号。
    /// 节点已被清理时复位本地注册状态并返回false，调用方需要重新注册
    pub async fn refresh_schedule_server(&self, server: &mut ScheduleServer) -> Result<bool> {
        let path = self.paths.server(&server.task_type, &server.uuid);
        if !self.store.exists(&path).await? {
            server.registered = false;
            return Ok(false);
        }
        let old_heart_beat = server.heart_beat_time;
        server.heart_beat_time = Utc::now();
        server.version += 1;
        let payload = serde_json::to_vec(&*server)?;
        match self.store.write(&path, Some(&payload), None).await {
            Ok(_) => Ok(true),
            Err(e) => {
                // 写入失败时恢复本地记录，等待下个心跳重试
                server.heart_beat_time = old_heart_beat;
                server.version -= 1;
                Err(e)
            }
        }
    }

    /// 注销调度服务器；节点不存在时静默返回
    pub async fn unregister_schedule_server(&self, task_type: &str, uuid: &str) -> Result<()> {
        let path = self.paths.server(task_type, uuid);
        if self.store.exists(&path).await? {
            self.store.delete(&path).await?;
        }
        Ok(())
    }

    /// 列出注册的服务器标识，按注册序号排序（不校验心跳）
    pub async fn load_schedule_server_names(&self, task_type: &str) -> Result<Vec<String>> {
        let server_root = self.paths.server_root(task_type);
        if !self.store.exists(&server_root).await? {
            return Ok(Vec::new());
        }
        let mut names = self.store.list_children(&server_root).await?;
        names.sort_by(|a, b| raw_suffix(a).cmp(raw_suffix(b)));
        Ok(names)
    }

    /// 读取全部服务器记录，按注册序号排序；无法解析的记录跳过
    pub async fn select_all_valid_schedule_server(
        &self,
        task_type: &str,
    ) -> Result<Vec<ScheduleServer>> {
        let names = self.load_schedule_server_names(task_type).await?;
        let mut result = Vec::with_capacity(names.len());
        for name in names {
            let path = self.paths.server(task_type, &name);
            match self.store.read(&path).await? {
                Some(record) => match record.data.as_deref().map(serde_json::from_slice::<ScheduleServer>) {
                    Some(Ok(mut server)) => {
                        server.center_server_time = Some(Utc::now());
                        result.push(server);
                    }
                    Some(Err(e)) => {
                        debug!("服务器记录解析失败 {}: {}", path, e);
                    }
                    None => {
                        debug!("服务器记录无数据 {}", path);
                    }
                },
                None => {}
            }
        }
        Ok(result)
    }

    /// 组合条件查询服务器记录
    ///
    /// baseTaskType与ownSign可以任意组合缺省：缺省的维度展开为所有取值。
    /// `order` 为逗号分隔的排序字段串，None时按
    /// `TASK_TYPE,OWN_SIGN,REGISTER_TIME,HEARTBEAT_TIME,IP` 排序
    pub async fn select_schedule_server(
        &self,
        base_task_type: Option<&str>,
        own_sign: Option<&str>,
        ip: Option<&str>,
        order: Option<&str>,
    ) -> Result<Vec<ScheduleServer>> {
        let mut names = Vec::new();
        match (base_task_type, own_sign) {
            (Some(base), Some(own)) => names.push(task_type_of(base, own)),
            (Some(base), None) => {
                let config_path = self.paths.task_type_config(base);
                if self.store.exists(&config_path).await? {
                    names.extend(self.store.list_children(&config_path).await?);
                }
            }
            (None, own) => {
                let root = self.paths.base_task_type_root();
                for base in self.store.list_children(&root).await? {
                    match own {
                        Some(own) => names.push(task_type_of(&base, own)),
                        None => {
                            let config_path = self.paths.task_type_config(&base);
                            names.extend(self.store.list_children(&config_path).await?);
                        }
                    }
                }
            }
        }

        let mut result = Vec::new();
        for name in names {
            for server in self.select_all_valid_schedule_server(&name).await? {
                if ip.map(|ip| ip == server.ip).unwrap_or(true) {
                    result.push(server);
                }
            }
        }
        let fields = ServerOrderField::parse_order(order);
        result.sort_by(|a, b| ServerOrderField::compare(&fields, a, b));
        Ok(result)
    }

    /// 历史服务器记录查询。当前协调存储不保留历史快照
    pub async fn select_history_schedule_server(
        &self,
        _base_task_type: Option<&str>,
        _own_sign: Option<&str>,
        _ip: Option<&str>,
        _order: Option<&str>,
    ) -> Result<Vec<ScheduleServer>> {
        Err(SchedulerError::NotImplemented("历史调度服务器查询"))
    }

    /// 按管理工厂标识检索所有任务类型下的服务器记录，
    /// 按taskType与注册序号排序
    pub async fn select_schedule_server_by_factory_id(
        &self,
        factory_id: &str,
    ) -> Result<Vec<ScheduleServer>> {
        let mut result = Vec::new();
        let root = self.paths.base_task_type_root();
        for base in self.store.list_children(&root).await? {
            let config_path = self.paths.task_type_config(&base);
            for task_type in self.store.list_children(&config_path).await? {
                for mut server in self.select_all_valid_schedule_server(&task_type).await? {
                    if server.manager_factory_id == factory_id {
                        server.center_server_time = Some(Utc::now());
                        result.push(server);
                    }
                }
            }
        }
        result.sort_by(|a, b| {
            a.task_type
                .cmp(&b.task_type)
                .then_with(|| raw_suffix(&a.uuid).cmp(raw_suffix(&b.uuid)))
        });
        Ok(result)
    }

    // ------------------------------------------------------------------
    // 失效检测与任务项分配
    // ------------------------------------------------------------------

    /// 清除心跳过期的服务器节点，返回清除数量。
    /// 并发清理时单个节点的读取/删除失败按已清除计数
    pub async fn clear_expire_schedule_server(
        &self,
        task_type: &str,
        expire: Duration,
    ) -> Result<usize> {
        let server_root = self.paths.server_root(task_type);
        self.ensure_path(&server_root).await?;

        let expire = chrono::Duration::milliseconds(expire.as_millis() as i64);
        let now = Utc::now();
        let mut removed = 0;
        for name in self.store.list_children(&server_root).await? {
            let path = format!("{}/{}", server_root, name);
            match self.store.read(&path).await {
                Ok(Some(record)) => {
                    if now - record.modified_at > expire {
                        if self.store.delete_subtree(&path).await.is_err() {
                            debug!("并发清理服务器节点 {}", path);
                        }
                        removed += 1;
                    }
                }
                Ok(None) | Err(_) => {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// 释放不在存活列表中的服务器占用的任务项，返回释放数量。
    /// 从未分配过的任务项也计入（调用方只把计数当诊断信息）
    pub async fn clear_task_item(&self, task_type: &str, live_servers: &[String]) -> Result<usize> {
        let item_root = self.paths.task_item_root(task_type);
        let mut freed = 0;
        for name in self.store.list_children(&item_root).await? {
            let cur_path = self.paths.task_item_leaf(task_type, &name, LEAF_CUR_SERVER);
            match self.read_text(&cur_path).await? {
                Some(owner) => {
                    if !live_servers.iter().any(|server| *server == owner) {
                        self.store.write(&cur_path, None, None).await?;
                        freed += 1;
                    }
                }
                None => {
                    freed += 1;
                }
            }
        }
        Ok(freed)
    }

    /// 领导者专用：按排序后的任务项轮转分配给存活服务器。
    ///
    /// 未分配的任务项直接写入持有者；持有者已正确且无迁移请求的不动；
    /// 其余写入迁移请求，等待持有者心跳时自行交出。只要有任何改动就
    /// 递增重载版本
    pub async fn assign_task_item(
        &self,
        task_type: &str,
        current_uuid: &str,
        server_list: &[String],
    ) -> Result<()> {
        if !leader::is_leader(current_uuid, server_list) {
            debug!("{}: 不是负责任务分配的Leader,直接返回", current_uuid);
            return Ok(());
        }
        if server_list.is_empty() {
            // 服务器动态调整时可能出现空列表
            return Ok(());
        }
        debug!("{}: 开始重新分配任务......", current_uuid);

        let item_root = self.paths.task_item_root(task_type);
        let mut names = self.store.list_children(&item_root).await?;
        names.sort();

        let mut point = 0;
        let mut unmodified = 0;
        for name in &names {
            let cur_path = self.paths.task_item_leaf(task_type, name, LEAF_CUR_SERVER);
            let req_path = self.paths.task_item_leaf(task_type, name, LEAF_REQ_SERVER);
            let cur = self.read_text(&cur_path).await?;
            let req = self.read_text(&req_path).await?;
            let target = &server_list[point];

            match cur {
                None => {
                    self.store
                        .write(&cur_path, Some(target.as_bytes()), None)
                        .await?;
                    self.store.write(&req_path, None, None).await?;
                }
                Some(owner) if owner == *target && req.is_none() => {
                    unmodified += 1;
                }
                Some(_) => {
                    self.store
                        .write(&req_path, Some(target.as_bytes()), None)
                        .await?;
                }
            }
            point = (point + 1) % server_list.len();
        }

        if unmodified < names.len() {
            // 有过任务重分配，所有服务器在下个心跳重新拉取任务
            self.update_reload_task_item_flag(task_type).await?;
            debug!(
                "{}: 任务项分配完成, 共{}项, 未变动{}项",
                current_uuid,
                names.len(),
                unmodified
            );
        }
        Ok(())
    }

    /// 交出自己持有、且已有迁移请求的任务项（两阶段交接的第二阶段）。
    /// 发生过释放时递增重载版本
    pub async fn release_deal_task_item(&self, task_type: &str, uuid: &str) -> Result<()> {
        let item_root = self.paths.task_item_root(task_type);
        let mut modified = false;
        for name in self.store.list_children(&item_root).await? {
            let cur_path = self.paths.task_item_leaf(task_type, &name, LEAF_CUR_SERVER);
            let req_path = self.paths.task_item_leaf(task_type, &name, LEAF_REQ_SERVER);
            let cur = self.read_text(&cur_path).await?;
            let req = self.read_text(&req_path).await?;
            if let (Some(owner), Some(target)) = (cur, req) {
                if owner == uuid {
                    self.store
                        .write(&cur_path, Some(target.as_bytes()), None)
                        .await?;
                    self.store.write(&req_path, None, None).await?;
                    modified = true;
                }
            }
        }
        if modified {
            self.update_reload_task_item_flag(task_type).await?;
        }
        Ok(())
    }

    /// 读取指定服务器当前持有的任务项，按任务项编号排序
    pub async fn reload_deal_task_item(
        &self,
        task_type: &str,
        uuid: &str,
    ) -> Result<Vec<OwnedTaskItem>> {
        let item_root = self.paths.task_item_root(task_type);
        let mut names = self.store.list_children(&item_root).await?;
        names.sort();

        let mut result = Vec::new();
        for name in names {
            let cur = self
                .read_text(&self.paths.task_item_leaf(task_type, &name, LEAF_CUR_SERVER))
                .await?;
            if cur.as_deref() == Some(uuid) {
                let parameter = self
                    .read_text(&self.paths.task_item_leaf(task_type, &name, LEAF_PARAMETER))
                    .await?
                    .unwrap_or_default();
                result.push(OwnedTaskItem::new(name, parameter));
            }
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // 暂停与恢复
    // ------------------------------------------------------------------

    /// 暂停任务类型的全部服务器：改写配置状态，各节点心跳时自行观察
    pub async fn pause_all_server(&self, base_task_type: &str) -> Result<()> {
        self.switch_task_type_status(base_task_type, TaskTypeStatus::Paused)
            .await
    }

    /// 恢复任务类型的全部服务器
    pub async fn resume_all_server(&self, base_task_type: &str) -> Result<()> {
        self.switch_task_type_status(base_task_type, TaskTypeStatus::Running)
            .await
    }

    async fn switch_task_type_status(
        &self,
        base_task_type: &str,
        status: TaskTypeStatus,
    ) -> Result<()> {
        let mut config = self
            .load_task_type_config(base_task_type)
            .await?
            .ok_or_else(|| SchedulerError::TaskTypeNotFound {
                base_task_type: base_task_type.to_string(),
            })?;
        config.status = status;
        self.update_base_task_type(&config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use taskshard_infrastructure::MemoryCoordinationStore;

    const BASE: &str = "demoJob";
    const TASK_TYPE: &str = "demoJob$BASE";

    async fn new_manager() -> (Arc<MemoryCoordinationStore>, ScheduleDataManager) {
        let store = Arc::new(MemoryCoordinationStore::new());
        let manager = ScheduleDataManager::new(store.clone(), "/taskshard")
            .await
            .unwrap();
        (store, manager)
    }

    fn demo_config(item_count: usize) -> TaskTypeConfig {
        let items = (0..item_count).map(|i| i.to_string()).collect();
        TaskTypeConfig::new(BASE).with_task_items(items)
    }

    async fn register(manager: &ScheduleDataManager, ip: &str) -> ScheduleServer {
        let mut server = ScheduleServer::new(BASE, DEFAULT_OWN_SIGN, ip, "test-host", "factory-1");
        manager.register_schedule_server(&mut server).await.unwrap();
        server
    }

    /// 建好配置、注册若干服务器并由领导者初始化任务项
    async fn bootstrap(
        manager: &ScheduleDataManager,
        item_count: usize,
        server_count: usize,
    ) -> Vec<ScheduleServer> {
        manager
            .create_base_task_type(&demo_config(item_count))
            .await
            .unwrap();
        let mut servers = Vec::new();
        for i in 0..server_count {
            servers.push(register(manager, &format!("10.0.0.{}", i + 1)).await);
        }
        let names = manager.load_schedule_server_names(TASK_TYPE).await.unwrap();
        let leader = leader::elect_leader(names.iter().map(String::as_str))
            .unwrap()
            .to_string();
        manager
            .initialize_running_info(BASE, DEFAULT_OWN_SIGN, &leader)
            .await
            .unwrap();
        servers
    }

    async fn owner_of(manager: &ScheduleDataManager, item_id: &str) -> Option<String> {
        manager
            .load_all_task_item(TASK_TYPE)
            .await
            .unwrap()
            .into_iter()
            .find(|item| item.item_id == item_id)
            .and_then(|item| item.current_server)
    }

    #[tokio::test]
    async fn test_register_assigns_sequential_uuid() {
        let (_, manager) = new_manager().await;
        manager.create_base_task_type(&demo_config(2)).await.unwrap();

        let server = register(&manager, "10.0.0.1").await;
        assert!(server.is_registered());
        assert!(server.uuid.starts_with("demoJob$BASE$10.0.0.1$"));
        let suffix = raw_suffix(&server.uuid);
        assert_eq!(suffix.len(), 10);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));

        // 存储里的记录能解析回同样的uuid
        let loaded = manager
            .select_all_valid_schedule_server(TASK_TYPE)
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].uuid, server.uuid);
        assert!(loaded[0].center_server_time.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_register_rejected() {
        let (_, manager) = new_manager().await;
        manager.create_base_task_type(&demo_config(1)).await.unwrap();
        let mut server = register(&manager, "10.0.0.1").await;
        let err = manager.register_schedule_server(&mut server).await.unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyRegistered { .. }));
    }

    #[tokio::test]
    async fn test_server_names_sorted_by_sequence() {
        let (_, manager) = new_manager().await;
        manager.create_base_task_type(&demo_config(1)).await.unwrap();
        let first = register(&manager, "10.0.0.9").await;
        let second = register(&manager, "10.0.0.1").await;

        let names = manager.load_schedule_server_names(TASK_TYPE).await.unwrap();
        assert_eq!(names, vec![first.uuid.clone(), second.uuid.clone()]);
        assert!(leader::is_leader(&first.uuid, &names));
    }

    #[tokio::test]
    async fn test_refresh_bumps_heartbeat_and_recovers_from_cleanup() {
        let (_, manager) = new_manager().await;
        manager.create_base_task_type(&demo_config(1)).await.unwrap();
        let mut server = register(&manager, "10.0.0.1").await;
        let version_before = server.version;

        assert!(manager.refresh_schedule_server(&mut server).await.unwrap());
        assert_eq!(server.version, version_before + 1);

        // 节点被并发清理后，刷新失败且本地状态复位
        manager
            .unregister_schedule_server(TASK_TYPE, &server.uuid)
            .await
            .unwrap();
        assert!(!manager.refresh_schedule_server(&mut server).await.unwrap());
        assert!(!server.is_registered());
    }

    #[tokio::test]
    async fn test_initialize_creates_items_with_parameters() {
        let (_, manager) = new_manager().await;
        let config = TaskTypeConfig::new(BASE).with_task_items(vec![
            "0:{TYPE=A}".to_string(),
            "1".to_string(),
        ]);
        manager.create_base_task_type(&config).await.unwrap();
        let server = register(&manager, "10.0.0.1").await;
        manager
            .initialize_running_info(BASE, DEFAULT_OWN_SIGN, &server.uuid)
            .await
            .unwrap();

        let items = manager.load_all_task_item(TASK_TYPE).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_id, "0");
        assert_eq!(items[0].deal_parameter, "TYPE=A");
        assert_eq!(items[0].status, TaskItemStatus::Active);
        assert!(items[0].current_server.is_none());
        assert_eq!(items[1].deal_parameter, "");

        assert!(manager
            .is_initial_running_info_success(BASE, DEFAULT_OWN_SIGN)
            .await
            .unwrap());
        assert_eq!(manager.query_task_item_count(TASK_TYPE).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_init_marker_must_match_current_leader() {
        let (_, manager) = new_manager().await;
        let servers = bootstrap(&manager, 2, 1).await;
        // 标记属于别的uuid时视为未初始化，新领导者会重建运行时
        manager
            .set_initial_running_info_success(BASE, TASK_TYPE, "someone-else")
            .await
            .unwrap();
        assert!(!manager
            .is_initial_running_info_success(BASE, DEFAULT_OWN_SIGN)
            .await
            .unwrap());
        manager
            .set_initial_running_info_success(BASE, TASK_TYPE, &servers[0].uuid)
            .await
            .unwrap();
        assert!(manager
            .is_initial_running_info_success(BASE, DEFAULT_OWN_SIGN)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_assign_round_robin_balanced() {
        let (_, manager) = new_manager().await;
        let servers = bootstrap(&manager, 4, 2).await;
        let names = manager.load_schedule_server_names(TASK_TYPE).await.unwrap();
        let flag_before = manager.get_reload_task_item_flag(TASK_TYPE).await.unwrap();

        manager
            .assign_task_item(TASK_TYPE, &servers[0].uuid, &names)
            .await
            .unwrap();

        // 排序后的任务项轮转分配：0/2给序号小的，1/3给序号大的
        assert_eq!(owner_of(&manager, "0").await.as_deref(), Some(names[0].as_str()));
        assert_eq!(owner_of(&manager, "1").await.as_deref(), Some(names[1].as_str()));
        assert_eq!(owner_of(&manager, "2").await.as_deref(), Some(names[0].as_str()));
        assert_eq!(owner_of(&manager, "3").await.as_deref(), Some(names[1].as_str()));

        // 有改动则重载版本递增
        let flag_after = manager.get_reload_task_item_flag(TASK_TYPE).await.unwrap();
        assert!(flag_after > flag_before);
    }

    #[tokio::test]
    async fn test_assign_noop_keeps_reload_version() {
        let (_, manager) = new_manager().await;
        let servers = bootstrap(&manager, 4, 2).await;
        let names = manager.load_schedule_server_names(TASK_TYPE).await.unwrap();
        manager
            .assign_task_item(TASK_TYPE, &servers[0].uuid, &names)
            .await
            .unwrap();

        let flag_before = manager.get_reload_task_item_flag(TASK_TYPE).await.unwrap();
        manager
            .assign_task_item(TASK_TYPE, &servers[0].uuid, &names)
            .await
            .unwrap();
        let flag_after = manager.get_reload_task_item_flag(TASK_TYPE).await.unwrap();
        assert_eq!(flag_after, flag_before);
    }

    #[tokio::test]
    async fn test_non_leader_assign_is_ignored() {
        let (_, manager) = new_manager().await;
        let servers = bootstrap(&manager, 2, 2).await;
        let names = manager.load_schedule_server_names(TASK_TYPE).await.unwrap();

        manager
            .assign_task_item(TASK_TYPE, &servers[1].uuid, &names)
            .await
            .unwrap();
        assert_eq!(owner_of(&manager, "0").await, None);
    }

    #[tokio::test]
    async fn test_two_phase_handoff() {
        let (_, manager) = new_manager().await;
        let servers = bootstrap(&manager, 2, 1).await;
        let leader = servers[0].uuid.clone();
        let names = manager.load_schedule_server_names(TASK_TYPE).await.unwrap();
        manager.assign_task_item(TASK_TYPE, &leader, &names).await.unwrap();

        // 新服务器加入后重新分配：已占用的任务项只写迁移请求
        let joined = register(&manager, "10.0.0.2").await;
        let names = manager.load_schedule_server_names(TASK_TYPE).await.unwrap();
        manager.assign_task_item(TASK_TYPE, &leader, &names).await.unwrap();

        let items = manager.load_all_task_item(TASK_TYPE).await.unwrap();
        assert_eq!(items[0].current_server.as_deref(), Some(leader.as_str()));
        assert!(items[0].request_server.is_none());
        assert_eq!(items[1].current_server.as_deref(), Some(leader.as_str()));
        assert_eq!(items[1].request_server.as_deref(), Some(joined.uuid.as_str()));

        // 持有者心跳时自行交出
        manager.release_deal_task_item(TASK_TYPE, &leader).await.unwrap();
        let items = manager.load_all_task_item(TASK_TYPE).await.unwrap();
        assert_eq!(items[1].current_server.as_deref(), Some(joined.uuid.as_str()));
        assert!(items[1].request_server.is_none());

        let owned = manager
            .reload_deal_task_item(TASK_TYPE, &joined.uuid)
            .await
            .unwrap();
        assert_eq!(owned, vec![OwnedTaskItem::new("1", "")]);
    }

    #[tokio::test]
    async fn test_release_without_request_is_noop() {
        let (_, manager) = new_manager().await;
        let servers = bootstrap(&manager, 2, 1).await;
        let names = manager.load_schedule_server_names(TASK_TYPE).await.unwrap();
        manager
            .assign_task_item(TASK_TYPE, &servers[0].uuid, &names)
            .await
            .unwrap();

        let flag_before = manager.get_reload_task_item_flag(TASK_TYPE).await.unwrap();
        manager
            .release_deal_task_item(TASK_TYPE, &servers[0].uuid)
            .await
            .unwrap();
        // 没有迁移请求时不触发重载
        assert_eq!(
            manager.get_reload_task_item_flag(TASK_TYPE).await.unwrap(),
            flag_before
        );
        assert_eq!(
            manager
                .reload_deal_task_item(TASK_TYPE, &servers[0].uuid)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_clear_task_item_frees_dead_owner() {
        let (_, manager) = new_manager().await;
        let servers = bootstrap(&manager, 3, 2).await;
        let names = manager.load_schedule_server_names(TASK_TYPE).await.unwrap();
        manager
            .assign_task_item(TASK_TYPE, &servers[0].uuid, &names)
            .await
            .unwrap();

        // 只保留领导者在存活列表中
        let live = vec![servers[0].uuid.clone()];
        let freed = manager.clear_task_item(TASK_TYPE, &live).await.unwrap();
        // 另一台占用的任务项1被释放
        assert_eq!(freed, 1);
        assert_eq!(owner_of(&manager, "1").await, None);
        assert!(owner_of(&manager, "0").await.is_some());
    }

    #[tokio::test]
    async fn test_clear_task_item_counts_unowned() {
        let (_, manager) = new_manager().await;
        let servers = bootstrap(&manager, 3, 1).await;
        let live = vec![servers[0].uuid.clone()];
        // 尚未分配过，三个任务项都按释放计数
        let freed = manager.clear_task_item(TASK_TYPE, &live).await.unwrap();
        assert_eq!(freed, 3);
    }

    #[tokio::test]
    async fn test_clear_expire_schedule_server() {
        let (store, manager) = new_manager().await;
        manager.create_base_task_type(&demo_config(2)).await.unwrap();
        let stale = register(&manager, "10.0.0.1").await;
        let fresh = register(&manager, "10.0.0.2").await;

        store
            .backdate(
                &manager.paths().server(TASK_TYPE, &stale.uuid),
                Duration::from_secs(3600),
            )
            .await
            .unwrap();

        let removed = manager
            .clear_expire_schedule_server(TASK_TYPE, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let names = manager.load_schedule_server_names(TASK_TYPE).await.unwrap();
        assert_eq!(names, vec![fresh.uuid]);
    }

    #[tokio::test]
    async fn test_reload_flag_increases_on_update() {
        let (_, manager) = new_manager().await;
        manager.create_base_task_type(&demo_config(1)).await.unwrap();
        register(&manager, "10.0.0.1").await;

        let initial = manager.get_reload_task_item_flag(TASK_TYPE).await.unwrap();
        let bumped = manager.update_reload_task_item_flag(TASK_TYPE).await.unwrap();
        assert!(bumped > initial);
        assert_eq!(
            manager.get_reload_task_item_flag(TASK_TYPE).await.unwrap(),
            bumped
        );
    }

    #[tokio::test]
    async fn test_create_base_task_type_validation() {
        let (_, manager) = new_manager().await;
        let bad = TaskTypeConfig::new("bad$name");
        assert!(matches!(
            manager.create_base_task_type(&bad).await.unwrap_err(),
            SchedulerError::InvalidTaskTypeName { .. }
        ));

        manager.create_base_task_type(&demo_config(1)).await.unwrap();
        assert!(matches!(
            manager.create_base_task_type(&demo_config(1)).await.unwrap_err(),
            SchedulerError::TaskTypeExists { .. }
        ));
    }

    #[tokio::test]
    async fn test_clear_task_type_keeps_config() {
        let (_, manager) = new_manager().await;
        bootstrap(&manager, 2, 1).await;

        manager.clear_task_type(BASE).await.unwrap();
        assert!(manager.load_task_type_config(BASE).await.unwrap().is_some());
        assert_eq!(
            manager
                .load_all_task_type_running_info(BASE)
                .await
                .unwrap()
                .len(),
            0
        );
        assert_eq!(manager.query_task_item_count(TASK_TYPE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_task_type_with_own_sign_prefix_overlap() {
        let (store, manager) = new_manager().await;
        bootstrap(&manager, 1, 1).await;
        // "A-1"的运行时键排在"A"与其子节点之间，整树删除不能被它截断
        for own_sign in ["A", "A-1"] {
            let mut server =
                ScheduleServer::new(BASE, own_sign, "10.0.0.8", "test-host", "factory-8");
            manager.register_schedule_server(&mut server).await.unwrap();
        }

        manager.clear_task_type(BASE).await.unwrap();

        assert_eq!(
            manager
                .load_all_task_type_running_info(BASE)
                .await
                .unwrap()
                .len(),
            0
        );
        // 服务器注册子树必须随运行时整树删除
        for task_type in ["demoJob$A", "demoJob$A-1"] {
            assert!(!store
                .exists(&manager.paths().server_root(task_type))
                .await
                .unwrap());
        }
    }

    #[tokio::test]
    async fn test_running_info_enumeration() {
        let (_, manager) = new_manager().await;
        bootstrap(&manager, 1, 1).await;
        manager
            .create_schedule_task_items(BASE, "tenantA", &["0".to_string()])
            .await
            .unwrap();

        let infos = manager.load_all_task_type_running_info(BASE).await.unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].task_type, "demoJob$BASE");
        assert_eq!(infos[0].own_sign, "BASE");
        assert_eq!(infos[1].task_type, "demoJob$tenantA");
        assert_eq!(infos[1].own_sign, "tenantA");
    }

    #[tokio::test]
    async fn test_clear_expire_running_info_skips_default_own_sign() {
        let (store, manager) = new_manager().await;
        bootstrap(&manager, 1, 1).await;
        manager
            .create_schedule_task_items(BASE, "tenantA", &["0".to_string()])
            .await
            .unwrap();

        // 两个运行时的分片根都回拨到一小时前
        for task_type in ["demoJob$BASE", "demoJob$tenantA"] {
            store
                .backdate(
                    &manager.paths().task_item_root(task_type),
                    Duration::from_secs(3600),
                )
                .await
                .unwrap();
        }

        let removed = manager
            .clear_expire_task_type_running_info(BASE, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let infos = manager.load_all_task_type_running_info(BASE).await.unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].own_sign, "BASE");
    }

    #[tokio::test]
    async fn test_clear_expire_running_info_keeps_uninitialized_runtime() {
        let (store, manager) = new_manager().await;
        bootstrap(&manager, 1, 1).await;

        // 租户刚注册，领导者还没建出分片根
        let mut tenant =
            ScheduleServer::new(BASE, "tenantA", "10.0.0.9", "test-host", "factory-9");
        manager.register_schedule_server(&mut tenant).await.unwrap();

        let removed = manager
            .clear_expire_task_type_running_info(BASE, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(removed, 0);
        let infos = manager.load_all_task_type_running_info(BASE).await.unwrap();
        assert_eq!(infos.len(), 2);

        // 运行时根老化后照常清除
        store
            .backdate(
                &manager.paths().runtime("demoJob$tenantA"),
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
        let removed = manager
            .clear_expire_task_type_running_info(BASE, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let infos = manager.load_all_task_type_running_info(BASE).await.unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].own_sign, "BASE");
    }

    #[tokio::test]
    async fn test_update_task_item_status_skips_missing_item() {
        let (_, manager) = new_manager().await;
        bootstrap(&manager, 1, 1).await;

        manager
            .update_schedule_task_item_status(
                TASK_TYPE,
                "0",
                TaskItemStatus::Paused,
                Some("人工暂停"),
            )
            .await
            .unwrap();
        let items = manager.load_all_task_item(TASK_TYPE).await.unwrap();
        assert_eq!(items[0].status, TaskItemStatus::Paused);
        assert_eq!(items[0].deal_desc, "人工暂停");

        // 不存在的任务项静默跳过
        manager
            .update_schedule_task_item_status(TASK_TYPE, "99", TaskItemStatus::Active, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_schedule_task_item() {
        let (_, manager) = new_manager().await;
        bootstrap(&manager, 2, 1).await;
        manager.delete_schedule_task_item(TASK_TYPE, "0").await.unwrap();
        assert_eq!(manager.query_task_item_count(TASK_TYPE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_select_schedule_server_combinations() {
        let (_, manager) = new_manager().await;
        bootstrap(&manager, 1, 2).await;

        let by_pair = manager
            .select_schedule_server(Some(BASE), Some(DEFAULT_OWN_SIGN), None, None)
            .await
            .unwrap();
        assert_eq!(by_pair.len(), 2);

        let by_base = manager
            .select_schedule_server(Some(BASE), None, None, None)
            .await
            .unwrap();
        assert_eq!(by_base.len(), 2);

        let by_ip = manager
            .select_schedule_server(None, None, Some("10.0.0.2"), None)
            .await
            .unwrap();
        assert_eq!(by_ip.len(), 1);
        assert_eq!(by_ip[0].ip, "10.0.0.2");

        let none = manager
            .select_schedule_server(Some("otherJob"), None, None, None)
            .await
            .unwrap();
        assert!(none.is_empty());

        // 指定排序字段
        let by_ip_order = manager
            .select_schedule_server(Some(BASE), None, None, Some("IP"))
            .await
            .unwrap();
        assert!(by_ip_order[0].ip <= by_ip_order[1].ip);
    }

    #[tokio::test]
    async fn test_select_by_factory_id() {
        let (_, manager) = new_manager().await;
        manager.create_base_task_type(&demo_config(1)).await.unwrap();
        let mut mine =
            ScheduleServer::new(BASE, DEFAULT_OWN_SIGN, "10.0.0.1", "host-a", "factory-mine");
        manager.register_schedule_server(&mut mine).await.unwrap();
        let mut other =
            ScheduleServer::new(BASE, DEFAULT_OWN_SIGN, "10.0.0.2", "host-b", "factory-other");
        manager.register_schedule_server(&mut other).await.unwrap();

        let found = manager
            .select_schedule_server_by_factory_id("factory-mine")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].uuid, mine.uuid);
    }

    #[tokio::test]
    async fn test_history_query_not_implemented() {
        let (_, manager) = new_manager().await;
        assert!(matches!(
            manager
                .select_history_schedule_server(Some(BASE), None, None, None)
                .await
                .unwrap_err(),
            SchedulerError::NotImplemented(_)
        ));
    }

    #[tokio::test]
    async fn test_pause_resume_toggle_status() {
        let (_, manager) = new_manager().await;
        manager.create_base_task_type(&demo_config(1)).await.unwrap();

        manager.pause_all_server(BASE).await.unwrap();
        let config = manager.load_task_type_config(BASE).await.unwrap().unwrap();
        assert!(config.is_paused());

        manager.resume_all_server(BASE).await.unwrap();
        let config = manager.load_task_type_config(BASE).await.unwrap().unwrap();
        assert!(!config.is_paused());

        assert!(matches!(
            manager.pause_all_server("missingJob").await.unwrap_err(),
            SchedulerError::TaskTypeNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_load_all_task_type_config_sorted() {
        let (_, manager) = new_manager().await;
        manager
            .create_base_task_type(&TaskTypeConfig::new("zJob").with_task_items(vec!["0".into()]))
            .await
            .unwrap();
        manager
            .create_base_task_type(&TaskTypeConfig::new("aJob").with_task_items(vec!["0".into()]))
            .await
            .unwrap();
        let all = manager.load_all_task_type_config().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].base_task_type, "aJob");
        assert_eq!(all[1].base_task_type, "zJob");
    }

    #[tokio::test]
    async fn test_delete_task_type_removes_everything() {
        let (store, manager) = new_manager().await;
        bootstrap(&manager, 2, 1).await;
        manager.delete_task_type(BASE).await.unwrap();
        assert!(manager.load_task_type_config(BASE).await.unwrap().is_none());
        assert!(!store
            .exists(&manager.paths().runtime(TASK_TYPE))
            .await
            .unwrap());
    }
}
