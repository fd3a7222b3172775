//! 内存版 CRUD 存储（InMemoryCrudStore）
//!
//! 基于 `DashMap` 的分片锁实现：`entry` 保证插入的“不存在才创建”原子性，
//! `get_mut` 保证版本比较与写入在同一把分片锁内完成。
//! 典型用途：测试环境、示例与本地开发；可通过 `set_available(false)` 模拟存储故障。
//!
use super::{CrudEntity, CrudStore, VersionedUpdate, WriteResult};
use crate::error::{DomainError, DomainResult as Result};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct InMemoryCrudStore<R> {
    rows: DashMap<String, R>,
    available: AtomicBool,
}

impl<R: CrudEntity> Default for InMemoryCrudStore<R> {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }
}

impl<R: CrudEntity> InMemoryCrudStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟存储可用性
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 直接写入（覆盖），用于预置数据
    pub fn put(&self, row: R) {
        self.rows.insert(row.id().to_string(), row);
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.rows.get(id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DomainError::store("in-memory store unavailable"))
        }
    }
}

#[async_trait]
impl<R: CrudEntity> CrudStore<R> for InMemoryCrudStore<R> {
    async fn insert(&self, rows: &[R]) -> Result<WriteResult> {
        self.ensure_available()?;

        let mut result = WriteResult::default();
        for row in rows {
            match self.rows.entry(row.id().to_string()) {
                Entry::Occupied(_) => result.push_failed(row.id()),
                Entry::Vacant(slot) => {
                    slot.insert(row.clone());
                }
            }
        }
        Ok(result)
    }

    async fn get_all(&self, ids: &[String]) -> Result<Vec<R>> {
        self.ensure_available()?;

        Ok(ids
            .iter()
            .filter_map(|id| self.rows.get(id).map(|r| r.value().clone()))
            .collect())
    }

    async fn update(&self, updates: &[VersionedUpdate<R>]) -> Result<WriteResult> {
        self.ensure_available()?;

        let mut result = WriteResult::default();
        for update in updates {
            let id = update.row.id();
            match self.rows.get_mut(id) {
                Some(mut current) if current.version() == update.expected_version => {
                    *current = update.row.clone();
                }
                _ => result.push_failed(id),
            }
        }
        Ok(result)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.ensure_available()?;

        for id in ids {
            self.rows.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_object::Version;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: String,
        version: Version,
        value: i64,
    }

    impl CrudEntity for Row {
        fn id(&self) -> &str {
            &self.id
        }

        fn version(&self) -> Version {
            self.version
        }
    }

    fn row(id: &str, version: usize, value: i64) -> Row {
        Row {
            id: id.to_string(),
            version: Version::from_value(version),
            value,
        }
    }

    #[tokio::test]
    async fn insert_reports_existing_ids() {
        let store = InMemoryCrudStore::new();
        let first = store.insert(&[row("a", 1, 1)]).await.unwrap();
        assert!(first.is_ok());

        let second = store.insert(&[row("a", 1, 2), row("b", 1, 3)]).await.unwrap();
        assert_eq!(second.failed_ids(), &["a".to_string()]);
        assert_eq!(store.get("a").unwrap().value, 1);
        assert_eq!(store.get("b").unwrap().value, 3);
    }

    #[tokio::test]
    async fn update_checks_expected_version() {
        let store = InMemoryCrudStore::new();
        store.put(row("a", 5, 10));

        // 期望版本落后：拒绝
        let stale = store
            .update(&[VersionedUpdate::new(row("a", 5, 99), Version::from_value(4))])
            .await
            .unwrap();
        assert!(stale.is_failed("a"));
        assert_eq!(store.get("a").unwrap().value, 10);

        let fresh = store
            .update(&[VersionedUpdate::new(row("a", 6, 11), Version::from_value(5))])
            .await
            .unwrap();
        assert!(fresh.is_ok());
        assert_eq!(store.get("a").unwrap(), row("a", 6, 11));

        // 不存在的行同样报告失败
        let missing = store
            .update(&[VersionedUpdate::new(row("zz", 1, 0), Version::new())])
            .await
            .unwrap();
        assert!(missing.is_failed("zz"));
    }

    #[tokio::test]
    async fn get_all_skips_missing_and_delete_removes() {
        let store = InMemoryCrudStore::new();
        store.put(row("a", 1, 1));
        store.put(row("b", 1, 2));

        let got = store
            .get_all(&["a".into(), "nope".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(got.len(), 2);

        store.delete(&["a".into(), "nope".into()]).await.unwrap();
        assert!(store.get("a").is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store: InMemoryCrudStore<Row> = InMemoryCrudStore::new();
        store.set_available(false);
        let err = store.insert(&[row("a", 1, 1)]).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.get_all(&["a".into()]).await.is_err());
    }
}
