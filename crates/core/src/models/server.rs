use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task_type::task_type_of;
use super::time_format;

/// 调度服务器注册信息
///
/// 注册时以JSON形式写入协调存储的顺序节点，心跳线程周期性回写。
/// `uuid` 在注册成功后由存储分配（顺序节点名），注册前为空。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleServer {
    #[serde(default)]
    pub uuid: String,
    pub base_task_type: String,
    pub task_type: String,
    pub own_sign: String,
    pub ip: String,
    pub host_name: String,
    pub manager_factory_id: String,
    #[serde(with = "time_format")]
    pub register_time: DateTime<Utc>,
    #[serde(with = "time_format")]
    pub heart_beat_time: DateTime<Utc>,
    /// 处理线程最近一次成功拉取数据的时间，随下一次心跳写回
    #[serde(with = "time_format::option", default)]
    pub last_fetch_time: Option<DateTime<Utc>>,
    /// 查询方读取列表时盖上的本地时钟，不参与调度
    #[serde(with = "time_format::option", default)]
    pub center_server_time: Option<DateTime<Utc>>,
    pub version: i64,
    pub is_paused: bool,
    #[serde(default)]
    pub deal_info_desc: String,
    /// 本地注册状态，不写入存储
    #[serde(skip)]
    pub registered: bool,
}

impl ScheduleServer {
    pub fn new(
        base_task_type: impl Into<String>,
        own_sign: impl Into<String>,
        ip: impl Into<String>,
        host_name: impl Into<String>,
        manager_factory_id: impl Into<String>,
    ) -> Self {
        let base_task_type = base_task_type.into();
        let own_sign = own_sign.into();
        let task_type = task_type_of(&base_task_type, &own_sign);
        let now = Utc::now();

        Self {
            uuid: String::new(),
            base_task_type,
            task_type,
            own_sign,
            ip: ip.into(),
            host_name: host_name.into(),
            manager_factory_id: manager_factory_id.into(),
            register_time: now,
            heart_beat_time: now,
            last_fetch_time: None,
            center_server_time: None,
            version: 0,
            is_paused: false,
            deal_info_desc: String::new(),
            registered: false,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

/// 生成管理工厂标识：`{ip}${hostname}${uuid}`
pub fn generate_factory_id(ip: &str, host_name: &str) -> String {
    format!("{}${}${}", ip, host_name, random_uuid_hex())
}

/// 无连字符的大写UUID十六进制串，用于注册节点名
pub fn random_uuid_hex() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}
