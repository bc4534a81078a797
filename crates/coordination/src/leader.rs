//! 无锁选主
//!
//! 每个节点对同一份有序服务器列表做同样的纯函数计算：注册标识末段
//! 顺序号最小者即领导者。列表来自协调存储的子节点枚举，列表一致则
//! 结论一致，无需任何分布式锁。

use crate::paths::sequence_suffix;

/// 从服务器标识列表中选出领导者（顺序号最小者）。
/// 无法解析顺序号的标识被跳过；列表为空或全部不可解析时返回None。
pub fn elect_leader<'a, I>(server_ids: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    server_ids
        .into_iter()
        .filter_map(|id| sequence_suffix(id).map(|seq| (seq, id)))
        .min_by_key(|(seq, _)| *seq)
        .map(|(_, id)| id)
}

/// 判断指定标识是否是当前领导者
pub fn is_leader(uuid: &str, server_ids: &[String]) -> bool {
    match elect_leader(server_ids.iter().map(String::as_str)) {
        Some(leader) => leader == uuid,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_sequence_wins() {
        let ids = vec![
            "demo$BASE$10.0.0.2$AA$0000000005".to_string(),
            "demo$BASE$10.0.0.1$BB$0000000003".to_string(),
            "demo$BASE$10.0.0.3$CC$0000000009".to_string(),
        ];
        assert_eq!(
            elect_leader(ids.iter().map(String::as_str)),
            Some("demo$BASE$10.0.0.1$BB$0000000003")
        );
        assert!(is_leader("demo$BASE$10.0.0.1$BB$0000000003", &ids));
        assert!(!is_leader("demo$BASE$10.0.0.2$AA$0000000005", &ids));
    }

    #[test]
    fn test_result_independent_of_order() {
        let mut ids = vec![
            "t$B$1$X$0000000002".to_string(),
            "t$B$2$Y$0000000001".to_string(),
            "t$B$3$Z$0000000004".to_string(),
        ];
        let first = elect_leader(ids.iter().map(String::as_str)).map(str::to_string);
        ids.reverse();
        let second = elect_leader(ids.iter().map(String::as_str)).map(str::to_string);
        assert_eq!(first, second);
        assert_eq!(first.as_deref(), Some("t$B$2$Y$0000000001"));
    }

    #[test]
    fn test_unparseable_suffix_skipped() {
        let ids = vec![
            "no-separator".to_string(),
            "t$B$1$X$not-a-number".to_string(),
            "t$B$2$Y$0000000008".to_string(),
        ];
        assert_eq!(
            elect_leader(ids.iter().map(String::as_str)),
            Some("t$B$2$Y$0000000008")
        );
        assert!(!is_leader("no-separator", &ids));
    }

    #[test]
    fn test_empty_or_all_invalid_has_no_leader() {
        assert_eq!(elect_leader(std::iter::empty::<&str>()), None);
        let ids = vec!["x".to_string(), "y$".to_string()];
        assert!(!is_leader("x", &ids));
    }
}
