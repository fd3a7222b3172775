//! 消息模型（message）
//!
//! - `Action`：命令/事件/请求载荷枚举的统一抽象（由 `#[action]` 宏实现）；
//! - `TopicMessage`：线上消息形态，按聚合标识分区；
//! - `InboundMessage`：驱动聚合器的入站消息（命令/事件/请求/迁移输入）；
//! - `Rejection` / `ResponseBody`：业务校验失败与请求响应；
//! - `TopicResolver`：由消息种类与状态类型推导主题名。
//!
mod action;
mod inbound;
mod topic;
mod topic_message;

pub use action::{Action, NoAction};
pub use inbound::{InboundMessage, Output, RESPONSE_TYPE, Rejection, ResponseBody, ResponseStatus};
pub use topic::{DEFAULT_NAMESPACE, TopicResolver};
pub use topic_message::{AggregateKey, MessageKind, TopicMessage};
