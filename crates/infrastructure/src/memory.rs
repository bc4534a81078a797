use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use taskshard_core::errors::{Result, SchedulerError};
use taskshard_core::traits::store::{CoordinationStore, NodeRecord};

/// 进程内协调存储
///
/// 以有序映射模拟层级命名空间，语义对齐外部协调存储：节点带修改版本与
/// 修改时间，顺序节点按父节点内的单调计数器命名。用于内嵌集群和测试。
pub struct MemoryCoordinationStore {
    nodes: Mutex<BTreeMap<String, MemoryNode>>,
}

#[derive(Debug, Clone)]
struct MemoryNode {
    data: Option<Vec<u8>>,
    version: i64,
    modified_at: DateTime<Utc>,
    /// 顺序子节点的下一个序号
    next_sequence: u64,
}

impl MemoryNode {
    fn new(data: Option<&[u8]>) -> Self {
        Self {
            data: data.map(|bytes| bytes.to_vec()),
            version: 0,
            modified_at: Utc::now(),
            next_sequence: 0,
        }
    }

    fn record(&self) -> NodeRecord {
        NodeRecord {
            data: self.data.clone(),
            version: self.version,
            modified_at: self.modified_at,
        }
    }
}

impl MemoryCoordinationStore {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(BTreeMap::new()),
        }
    }

    /// 把节点的修改时间向过去拨动，用于过期清理的测试
    pub async fn backdate(&self, path: &str, age: Duration) -> Result<()> {
        let path = normalize(path)?;
        let offset = chrono::Duration::from_std(age)
            .map_err(|e| SchedulerError::Storage(format!("时间偏移超出范围: {}", e)))?;

        let mut nodes = self.nodes.lock().await;
        let node = nodes
            .get_mut(&path)
            .ok_or_else(|| SchedulerError::NodeMissing { path: path.clone() })?;
        node.modified_at -= offset;
        Ok(())
    }

    pub async fn node_count(&self) -> usize {
        self.nodes.lock().await.len()
    }
}

impl Default for MemoryCoordinationStore {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> Result<String> {
    if !path.starts_with('/') || path == "/" {
        return Err(SchedulerError::Storage(format!("非法的节点路径: {}", path)));
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.split('/').skip(1).any(str::is_empty) {
        return Err(SchedulerError::Storage(format!("非法的节点路径: {}", path)));
    }
    Ok(trimmed.to_string())
}

/// 父路径；顶层节点的父路径视为根，根恒存在
fn parent_of(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some(("", _)) | None => None,
        Some((parent, _)) => Some(parent),
    }
}

#[async_trait]
impl CoordinationStore for MemoryCoordinationStore {
    async fn create(&self, path: &str, data: Option<&[u8]>) -> Result<()> {
        let path = normalize(path)?;
        let mut nodes = self.nodes.lock().await;

        if let Some(parent) = parent_of(&path) {
            if !nodes.contains_key(parent) {
                return Err(SchedulerError::NodeMissing {
                    path: parent.to_string(),
                });
            }
        }
        if nodes.contains_key(&path) {
            return Err(SchedulerError::NodeExists { path });
        }

        nodes.insert(path, MemoryNode::new(data));
        Ok(())
    }

    async fn create_sequential(&self, path_prefix: &str, data: Option<&[u8]>) -> Result<String> {
        let prefix = normalize(path_prefix)?;
        let (parent, leaf_prefix) = match prefix.rsplit_once('/') {
            Some((parent, leaf)) if !parent.is_empty() => (parent.to_string(), leaf.to_string()),
            _ => {
                return Err(SchedulerError::Storage(format!(
                    "顺序节点前缀必须有父节点: {}",
                    path_prefix
                )))
            }
        };

        let mut nodes = self.nodes.lock().await;
        let sequence = {
            let parent_node =
                nodes
                    .get_mut(parent.as_str())
                    .ok_or_else(|| SchedulerError::NodeMissing {
                        path: parent.clone(),
                    })?;
            let sequence = parent_node.next_sequence;
            parent_node.next_sequence += 1;
            sequence
        };

        let full_path = format!("{}/{}{:010}", parent, leaf_prefix, sequence);
        if nodes.contains_key(&full_path) {
            return Err(SchedulerError::NodeExists { path: full_path });
        }
        nodes.insert(full_path.clone(), MemoryNode::new(data));
        Ok(full_path)
    }

    async fn read(&self, path: &str) -> Result<Option<NodeRecord>> {
        let path = normalize(path)?;
        let nodes = self.nodes.lock().await;
        Ok(nodes.get(&path).map(MemoryNode::record))
    }

    async fn write(
        &self,
        path: &str,
        data: Option<&[u8]>,
        expected_version: Option<i64>,
    ) -> Result<i64> {
        let path = normalize(path)?;
        let mut nodes = self.nodes.lock().await;
        let node = nodes
            .get_mut(&path)
            .ok_or_else(|| SchedulerError::NodeMissing { path: path.clone() })?;

        if let Some(expected) = expected_version {
            if expected != node.version {
                return Err(SchedulerError::VersionConflict { path });
            }
        }

        node.data = data.map(|bytes| bytes.to_vec());
        node.version += 1;
        node.modified_at = Utc::now();
        Ok(node.version)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let path = normalize(path)?;
        let nodes = self.nodes.lock().await;
        Ok(nodes.contains_key(&path))
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>> {
        let path = normalize(path)?;
        let nodes = self.nodes.lock().await;
        if !nodes.contains_key(&path) {
            return Err(SchedulerError::NodeMissing { path });
        }

        let prefix = format!("{}/", path);
        let children = nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let rest = &key[prefix.len()..];
                if rest.contains('/') {
                    None
                } else {
                    Some(rest.to_string())
                }
            })
            .collect();
        Ok(children)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = normalize(path)?;
        let mut nodes = self.nodes.lock().await;
        if !nodes.contains_key(&path) {
            return Err(SchedulerError::NodeMissing { path });
        }

        let prefix = format!("{}/", path);
        let has_children = nodes
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix));
        if has_children {
            return Err(SchedulerError::Storage(format!(
                "节点存在子节点，不能直接删除: {}",
                path
            )));
        }

        nodes.remove(&path);
        Ok(())
    }

    async fn delete_subtree(&self, path: &str) -> Result<()> {
        let path = normalize(path)?;
        let mut nodes = self.nodes.lock().await;

        // `$`、`-` 等字符的字节序排在 `/` 之前，兄弟键可能落在 path 与
        // path/ 之间：扫描必须锚定到子前缀，否则会在兄弟处提前截断
        let prefix = format!("{}/", path);
        let doomed: Vec<String> = nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            nodes.remove(&key);
        }
        nodes.remove(&path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_requires_parent() {
        let store = MemoryCoordinationStore::new();
        let err = store.create("/a/b", None).await.unwrap_err();
        assert!(matches!(err, SchedulerError::NodeMissing { .. }));

        store.create("/a", None).await.unwrap();
        store.create("/a/b", Some(b"x")).await.unwrap();

        let record = store.read("/a/b").await.unwrap().unwrap();
        assert_eq!(record.data.as_deref(), Some(b"x".as_ref()));
        assert_eq!(record.version, 0);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = MemoryCoordinationStore::new();
        store.create("/a", None).await.unwrap();
        let err = store.create("/a", None).await.unwrap_err();
        assert!(matches!(err, SchedulerError::NodeExists { .. }));
    }

    #[tokio::test]
    async fn test_write_bumps_version() {
        let store = MemoryCoordinationStore::new();
        store.create("/a", None).await.unwrap();

        assert_eq!(store.write("/a", Some(b"1"), None).await.unwrap(), 1);
        assert_eq!(store.write("/a", Some(b"2"), None).await.unwrap(), 2);

        let err = store.write("/a", None, Some(1)).await.unwrap_err();
        assert!(matches!(err, SchedulerError::VersionConflict { .. }));
        assert_eq!(store.write("/a", None, Some(2)).await.unwrap(), 3);
        assert!(store.read("/a").await.unwrap().unwrap().data.is_none());
    }

    #[tokio::test]
    async fn test_sequential_names_are_zero_padded_and_monotonic() {
        let store = MemoryCoordinationStore::new();
        store.create("/a", None).await.unwrap();

        let first = store.create_sequential("/a/job$", None).await.unwrap();
        let second = store.create_sequential("/a/job$", None).await.unwrap();
        assert_eq!(first, "/a/job$0000000000");
        assert_eq!(second, "/a/job$0000000001");

        // 删除已有顺序节点不会回退计数器
        store.delete(&first).await.unwrap();
        let third = store.create_sequential("/a/job$", None).await.unwrap();
        assert_eq!(third, "/a/job$0000000002");
    }

    #[tokio::test]
    async fn test_list_children_direct_only() {
        let store = MemoryCoordinationStore::new();
        store.create("/a", None).await.unwrap();
        store.create("/a/x", None).await.unwrap();
        store.create("/a/y", None).await.unwrap();
        store.create("/a/x/deep", None).await.unwrap();

        let mut children = store.list_children("/a").await.unwrap();
        children.sort();
        assert_eq!(children, vec!["x".to_string(), "y".to_string()]);

        let err = store.list_children("/missing").await.unwrap_err();
        assert!(matches!(err, SchedulerError::NodeMissing { .. }));
    }

    #[tokio::test]
    async fn test_delete_refuses_non_leaf() {
        let store = MemoryCoordinationStore::new();
        store.create("/a", None).await.unwrap();
        store.create("/a/b", None).await.unwrap();

        assert!(store.delete("/a").await.is_err());
        store.delete("/a/b").await.unwrap();
        store.delete("/a").await.unwrap();
        assert!(!store.exists("/a").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_subtree_is_recursive_and_tolerant() {
        let store = MemoryCoordinationStore::new();
        store.create("/a", None).await.unwrap();
        store.create("/a/b", None).await.unwrap();
        store.create("/a/b/c", None).await.unwrap();
        store.create("/ab", None).await.unwrap();

        store.delete_subtree("/a").await.unwrap();
        assert!(!store.exists("/a").await.unwrap());
        assert!(!store.exists("/a/b/c").await.unwrap());
        // 前缀相近的兄弟节点不受影响
        assert!(store.exists("/ab").await.unwrap());

        // 再次删除不存在的子树静默成功
        store.delete_subtree("/a").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_subtree_with_sibling_sorting_before_children() {
        let store = MemoryCoordinationStore::new();
        store.create("/r", None).await.unwrap();
        store.create("/r/demo$A", None).await.unwrap();
        // `-` 排在 `/` 之前，该兄弟键恰好落在子树根与其子节点之间
        store.create("/r/demo$A-1", None).await.unwrap();
        store.create("/r/demo$A/server", None).await.unwrap();
        store.create("/r/demo$A/server/node0", None).await.unwrap();

        store.delete_subtree("/r/demo$A").await.unwrap();

        assert!(!store.exists("/r/demo$A").await.unwrap());
        assert!(!store.exists("/r/demo$A/server").await.unwrap());
        assert!(!store.exists("/r/demo$A/server/node0").await.unwrap());
        assert!(store.exists("/r/demo$A-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_backdate_moves_modified_time() {
        let store = MemoryCoordinationStore::new();
        store.create("/a", None).await.unwrap();

        let before = store.read("/a").await.unwrap().unwrap().modified_at;
        store
            .backdate("/a", Duration::from_secs(3600))
            .await
            .unwrap();
        let after = store.read("/a").await.unwrap().unwrap().modified_at;
        assert!(before - after >= chrono::Duration::seconds(3600));
    }
}
