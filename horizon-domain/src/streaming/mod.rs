//! 流式订阅（streaming）
//!
//! 面向有序、分区、至少一次投递传输的订阅运行时：
//! - `StreamTransport` / `StreamConsumer` / `TopicAdmin`：传输协议；
//! - `InMemoryTransport`：进程内实现，支持独占、共享、故障转移与按 key 共享四种拓扑；
//! - `SubscriptionBuilder` → `SubscriptionConfig` → `Subscription`：构建、校验与运行；
//! - `BatchHandler`：按批处理，按聚合标识报告成败；
//! - `BackoffStrategy`：失败重投的等待策略；
//! - `StreamingClient`：订阅与发布的统一入口。
//!
mod backoff;
mod builder;
mod client;
mod config;
mod handler;
mod subscription;
mod transport;
mod transport_inmemory;
mod type_registry;

pub use backoff::{BackoffStrategy, ConstantBackoff, ExponentialBackoff};
pub use builder::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_BATCH_WAIT, SubscriptionBuilder};
pub use client::{Publisher, StreamingClient};
pub use config::{StartPosition, SubscriptionConfig, SubscriptionType};
pub use handler::{Batch, BatchHandler, BatchResult};
pub use subscription::{MAX_BUFFERED_BATCHES, Subscription, SubscriptionHandle};
pub use transport::{Delivery, DeliveryId, StreamConsumer, StreamTransport, TopicAdmin};
pub use transport_inmemory::InMemoryTransport;
pub use type_registry::{TypeBinding, TypeRegistry};

pub use crate::message::TopicResolver;
