use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

/// 协调存储节点的负载与元信息
#[derive(Debug, Clone)]
pub struct NodeRecord {
    /// 节点负载，None表示节点无数据
    pub data: Option<Vec<u8>>,
    /// 单调递增的修改版本号，创建时为0
    pub version: i64,
    /// 最近一次修改时间
    pub modified_at: DateTime<Utc>,
}

impl NodeRecord {
    /// 以UTF-8文本读取节点负载
    pub fn text(&self) -> Option<String> {
        self.data
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

/// 协调存储抽象
///
/// 提供ZooKeeper风格的层级节点原语：带版本的负载读写、原子子节点列表、
/// 顺序唯一命名子节点。调度协议层的所有存储访问都经由该契约。
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// 创建节点。父节点必须存在；节点已存在时返回 `NodeExists`
    async fn create(&self, path: &str, data: Option<&[u8]>) -> Result<()>;

    /// 创建顺序节点：在前缀后追加10位零填充的单调序号，返回完整路径
    async fn create_sequential(&self, path_prefix: &str, data: Option<&[u8]>) -> Result<String>;

    /// 读取节点；不存在时返回None
    async fn read(&self, path: &str) -> Result<Option<NodeRecord>>;

    /// 写入节点负载并返回新版本号
    ///
    /// `expected_version` 为Some时做条件写，版本不匹配返回 `VersionConflict`；
    /// 为None时无条件覆盖。节点不存在返回 `NodeMissing`。
    async fn write(
        &self,
        path: &str,
        data: Option<&[u8]>,
        expected_version: Option<i64>,
    ) -> Result<i64>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// 列出直接子节点名（无序，调用方自行排序）
    async fn list_children(&self, path: &str) -> Result<Vec<String>>;

    /// 删除叶子节点；存在子节点或节点缺失时报错
    async fn delete(&self, path: &str) -> Result<()>;

    /// 递归删除子树；路径不存在时静默返回
    async fn delete_subtree(&self, path: &str) -> Result<()>;
}
