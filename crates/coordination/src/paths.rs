//! 协调存储路径布局
//!
//! 所有节点共享一套固定的层级结构：
//!
//! ```text
//! {root}/baseTaskType/{baseTaskType}                          任务类型配置(JSON)
//! {root}/baseTaskType/{baseTaskType}/{taskType}               运行时根
//! {root}/baseTaskType/{baseTaskType}/{taskType}/server        服务器注册区(节点版本即重载版本)
//! {root}/baseTaskType/{baseTaskType}/{taskType}/server/{id}   ScheduleServer(JSON)
//! {root}/baseTaskType/{baseTaskType}/{taskType}/taskItem      任务项区(数据为初始化成功标记)
//! {root}/baseTaskType/{baseTaskType}/{taskType}/taskItem/{i}  单个任务项
//! ```
//!
//! 任务项节点下的叶子：`cur_server`、`req_server`、`sts`、`parameter`、`deal_desc`。

use taskshard_core::split_base_task_type;

/// baseTaskType目录段
pub const BASE_TASK_TYPE_DIR: &str = "baseTaskType";
/// 服务器注册区段
pub const SERVER_DIR: &str = "server";
/// 任务项区段
pub const TASK_ITEM_DIR: &str = "taskItem";

/// 任务项当前持有者叶子
pub const LEAF_CUR_SERVER: &str = "cur_server";
/// 任务项请求迁移目标叶子
pub const LEAF_REQ_SERVER: &str = "req_server";
/// 任务项状态叶子
pub const LEAF_STS: &str = "sts";
/// 任务项参数叶子
pub const LEAF_PARAMETER: &str = "parameter";
/// 任务项处理描述叶子
pub const LEAF_DEAL_DESC: &str = "deal_desc";

/// 基于配置根路径的存储路径构造器
#[derive(Debug, Clone)]
pub struct StorePaths {
    root: String,
}

impl StorePaths {
    pub fn new(root_path: &str) -> Self {
        Self {
            root: root_path.trim_end_matches('/').to_string(),
        }
    }

    /// 配置根路径
    pub fn root(&self) -> &str {
        &self.root
    }

    /// 所有任务类型配置的父节点
    pub fn base_task_type_root(&self) -> String {
        format!("{}/{}", self.root, BASE_TASK_TYPE_DIR)
    }

    /// 任务类型配置节点
    pub fn task_type_config(&self, base_task_type: &str) -> String {
        format!("{}/{}", self.base_task_type_root(), base_task_type)
    }

    /// 运行时根节点，`task_type` 形如 `{base}${ownSign}`
    pub fn runtime(&self, task_type: &str) -> String {
        format!(
            "{}/{}",
            self.task_type_config(split_base_task_type(task_type)),
            task_type
        )
    }

    /// 服务器注册区节点
    pub fn server_root(&self, task_type: &str) -> String {
        format!("{}/{}", self.runtime(task_type), SERVER_DIR)
    }

    /// 单个服务器记录节点
    pub fn server(&self, task_type: &str, uuid: &str) -> String {
        format!("{}/{}", self.server_root(task_type), uuid)
    }

    /// 任务项区节点
    pub fn task_item_root(&self, task_type: &str) -> String {
        format!("{}/{}", self.runtime(task_type), TASK_ITEM_DIR)
    }

    /// 单个任务项节点
    pub fn task_item(&self, task_type: &str, item_id: &str) -> String {
        format!("{}/{}", self.task_item_root(task_type), item_id)
    }

    /// 任务项下的叶子节点
    pub fn task_item_leaf(&self, task_type: &str, item_id: &str, leaf: &str) -> String {
        format!("{}/{}", self.task_item(task_type, item_id), leaf)
    }
}

/// 解析注册标识末段的顺序号（最后一个 `$` 之后的十进制数字）。
/// 无法解析时返回None，选主时此类标识会被跳过。
pub fn sequence_suffix(server_id: &str) -> Option<u64> {
    let suffix = raw_suffix(server_id);
    if suffix.is_empty() {
        return None;
    }
    suffix.parse::<u64>().ok()
}

/// 注册标识末段的原始文本（最后一个 `$` 之后；没有 `$` 时为整个标识）
pub fn raw_suffix(server_id: &str) -> &str {
    match server_id.rfind('$') {
        Some(idx) => &server_id[idx + 1..],
        None => server_id,
    }
}

/// 拆分任务项定义 `id:{参数}`。
///
/// 参数包裹在首个 `:{` 与末尾 `}` 之间，冒号两侧允许空白；
/// 不含参数段时整个定义就是任务项编号。
pub fn split_task_item_define(definition: &str) -> (String, String) {
    if let Some((colon, brace)) = find_parameter_start(definition) {
        let item_id = definition[..colon].trim().to_string();
        let rest = &definition[brace + 1..];
        let parameter = match rest.rfind('}') {
            Some(end) => rest[..end].trim().to_string(),
            None => rest.trim().to_string(),
        };
        (item_id, parameter)
    } else {
        (definition.trim().to_string(), String::new())
    }
}

/// 定位首个"冒号后跟左花括号"的位置，返回(冒号下标, 左花括号下标)
fn find_parameter_start(definition: &str) -> Option<(usize, usize)> {
    for (idx, ch) in definition.char_indices() {
        if ch != ':' {
            continue;
        }
        let rest = &definition[idx + 1..];
        let skipped = rest.len() - rest.trim_start().len();
        if rest.trim_start().starts_with('{') {
            return Some((idx, idx + 1 + skipped));
        }
    }
    None
}
