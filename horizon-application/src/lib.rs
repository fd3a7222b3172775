//! 应用层装配（horizon-application）
//!
//! 在领域层协议之上提供可运行的处理管线：
//! - `AggregateService`：订阅批处理器，加锁、归约、乐观落库、发布；
//! - `Host` / `HostedService`：按状态类型装配快照、视图与迁移服务；
//! - `StateRegistry` / `StoreFactory`：库名与存储解析；
//! - `ProcessingConfig`：YAML + 环境变量配置；
//! - `telemetry::init_tracing`：日志初始化。
//!
pub mod config;
pub mod error;
pub mod hosted;
pub mod registry;
pub mod service;
pub mod store_factory;
pub mod telemetry;

pub use config::{BackoffConfig, ProcessingConfig};
pub use error::{AppError, AppResult};
pub use hosted::{AggregateStateHostedService, Host, HostedService};
pub use registry::{StateBinding, StateRegistry};
pub use service::AggregateService;
pub use store_factory::{InMemoryStoreFactory, StoreFactory};
