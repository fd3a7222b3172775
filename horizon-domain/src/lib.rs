//! 状态化流处理领域层（horizon-domain）
//!
//! 提供以“状态 + 消息流”为中心的通用抽象与构件，用于在应用中实现：
//! - 状态建模（`state`）：命令校验、请求响应与事件折叠，快照/视图行封装；
//! - 消息模型（`message`）：线上消息、入站消息、拒绝与响应、主题命名；
//! - 聚合器（`aggregator`）：快照、视图与迁移三种纯归约；
//! - 持久化（`persist`）：带乐观版本的 CRUD 存储协议与内存实现；
//! - 分布式租约锁（`lock`）：基于 CRUD 存储的跨进程互斥；
//! - 流式订阅（`streaming`）：批处理、重投、退避与失败保序的订阅运行时；
//! - 值对象（`value_object`）与错误类型（`error`）。
//!
//! 本 crate 保持与存储与传输实现解耦，仅定义协议与内存实现，
//! 以便在不同基础设施（例如 Postgres、Pulsar 等）上进行适配实现。
//!
//! 典型用法：
//! 1. 为状态实现 `State`，用 `#[action]` 定义命令、事件与请求枚举；
//! 2. 选择聚合器（`SnapshotAggregator` / `ViewAggregator` / `MigrationAggregator`）；
//! 3. 通过 `streaming::StreamingClient` 订阅主题，并在批处理器中加锁、归约、持久化、发布。
//!
pub mod aggregator;
pub mod error;
#[cfg(feature = "runtime")]
pub mod lock;
pub mod message;
pub mod persist;
pub mod state;
#[cfg(feature = "runtime")]
pub mod streaming;
pub mod value_object;

// 允许在本 crate 内部通过 ::horizon_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::horizon_domain 路径。
extern crate self as horizon_domain;
