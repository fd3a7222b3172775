//! 存储工厂（StoreFactory）
//!
//! 按库名解析状态行与锁行的 CRUD 存储；锁存储位于 `{database}_lock`。
//!
use crate::error::{AppError, AppResult};
use dashmap::DashMap;
use horizon_domain::lock::Lock;
use horizon_domain::persist::{CrudEntity, CrudStore, InMemoryCrudStore};
use std::any::Any;
use std::sync::Arc;

pub trait StoreFactory: Send + Sync + 'static {
    fn store<R: CrudEntity>(&self, database: &str) -> AppResult<Arc<dyn CrudStore<R>>>;

    fn lock_store(&self, database: &str) -> AppResult<Arc<dyn CrudStore<Lock>>> {
        self.store::<Lock>(&format!("{database}_lock"))
    }
}

/// 内存存储工厂：同一库名共享同一个存储实例
#[derive(Default)]
pub struct InMemoryStoreFactory {
    stores: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl InMemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得具体类型的内存存储，便于测试中直接观察与预置
    pub fn in_memory<R: CrudEntity>(&self, database: &str) -> AppResult<Arc<InMemoryCrudStore<R>>> {
        let erased = self
            .stores
            .entry(database.to_string())
            .or_insert_with(|| Arc::new(InMemoryCrudStore::<R>::new()) as Arc<dyn Any + Send + Sync>)
            .value()
            .clone();

        erased
            .downcast::<InMemoryCrudStore<R>>()
            .map_err(|_| AppError::TypeMismatch {
                database: database.to_string(),
                expected: std::any::type_name::<R>(),
            })
    }
}

impl StoreFactory for InMemoryStoreFactory {
    fn store<R: CrudEntity>(&self, database: &str) -> AppResult<Arc<dyn CrudStore<R>>> {
        let store: Arc<dyn CrudStore<R>> = self.in_memory::<R>(database)?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn shares_one_store_per_database() {
        let factory = InMemoryStoreFactory::new();
        let a = factory.in_memory::<Lock>("snapshot_account_lock").unwrap();
        a.put(Lock::new("acct-1", Utc::now()));

        let b = factory.in_memory::<Lock>("snapshot_account_lock").unwrap();
        assert_eq!(b.len(), 1);
        assert!(factory.lock_store("snapshot_account").is_ok());
    }

    #[derive(Clone, Debug)]
    struct Other(String);

    impl CrudEntity for Other {
        fn id(&self) -> &str {
            &self.0
        }
    }

    #[test]
    fn rejects_mismatched_row_type() {
        let factory = InMemoryStoreFactory::new();
        factory.in_memory::<Lock>("db").unwrap();
        let err = factory.in_memory::<Other>("db").unwrap_err();
        assert!(matches!(err, AppError::TypeMismatch { .. }));
    }
}
