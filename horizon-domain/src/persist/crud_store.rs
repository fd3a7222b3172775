//! CRUD 存储协议（CrudStore）
//!
//! 按 id 批量读写，逐条报告失败：
//! - `insert` 对已存在的 id 报告失败（原子的“不存在才创建”）；
//! - `update` 仅当存储中的版本等于期望版本时写入，否则报告失败；
//! - 只有整个存储不可用时才返回 `Err`。
//!
use crate::error::DomainResult as Result;
use crate::value_object::Version;
use async_trait::async_trait;
use std::sync::Arc;

/// 可按 id 存取的存储行
pub trait CrudEntity: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// 乐观并发版本；无版本语义的行保持默认值
    fn version(&self) -> Version {
        Version::new()
    }
}

/// 批量写入结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteResult {
    failed_ids: Vec<String>,
}

impl WriteResult {
    pub fn failed(ids: Vec<String>) -> Self {
        Self { failed_ids: ids }
    }

    pub fn push_failed(&mut self, id: impl Into<String>) {
        self.failed_ids.push(id.into());
    }

    pub fn failed_ids(&self) -> &[String] {
        &self.failed_ids
    }

    pub fn is_ok(&self) -> bool {
        self.failed_ids.is_empty()
    }

    pub fn is_failed(&self, id: &str) -> bool {
        self.failed_ids.iter().any(|f| f == id)
    }
}

/// 带期望版本的更新
#[derive(Debug, Clone)]
pub struct VersionedUpdate<R> {
    pub row: R,
    pub expected_version: Version,
}

impl<R> VersionedUpdate<R> {
    pub fn new(row: R, expected_version: Version) -> Self {
        Self {
            row,
            expected_version,
        }
    }
}

#[async_trait]
pub trait CrudStore<R: CrudEntity>: Send + Sync {
    async fn insert(&self, rows: &[R]) -> Result<WriteResult>;

    /// 读取存在的行，缺失的 id 直接忽略
    async fn get_all(&self, ids: &[String]) -> Result<Vec<R>>;

    async fn update(&self, updates: &[VersionedUpdate<R>]) -> Result<WriteResult>;

    async fn delete(&self, ids: &[String]) -> Result<()>;
}

#[async_trait]
impl<R, T> CrudStore<R> for Arc<T>
where
    R: CrudEntity,
    T: CrudStore<R> + ?Sized,
{
    async fn insert(&self, rows: &[R]) -> Result<WriteResult> {
        (**self).insert(rows).await
    }

    async fn get_all(&self, ids: &[String]) -> Result<Vec<R>> {
        (**self).get_all(ids).await
    }

    async fn update(&self, updates: &[VersionedUpdate<R>]) -> Result<WriteResult> {
        (**self).update(updates).await
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        (**self).delete(ids).await
    }
}
