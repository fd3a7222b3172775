//! 持久化（persist）
//!
//! 定义状态行与锁行共用的 CRUD 存储协议，并提供内存实现：
//! - `CrudStore`：批量插入/读取/条件更新/删除，逐条报告失败；
//! - `InMemoryCrudStore`：基于 `DashMap` 的实现，用于测试与本地开发。
//!
//! 具体存储后端（如 Postgres）由上层提供实现并注入。
//!
mod crud_store;
mod crud_store_inmemory;

pub use crud_store::{CrudEntity, CrudStore, VersionedUpdate, WriteResult};
pub use crud_store_inmemory::InMemoryCrudStore;
