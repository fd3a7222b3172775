//! 流传输协议（StreamTransport）
//!
//! 有序、分区、至少一次投递的传输抽象：
//! - `StreamTransport`：发布与按订阅配置创建消费者；
//! - `StreamConsumer`：接收、确认、否认与关闭；
//! - `TopicAdmin`：主题管理。
//!
use super::SubscriptionConfig;
use crate::error::DomainResult as Result;
use crate::message::TopicMessage;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// 投递标识：主题 + 主题内序号
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryId {
    pub topic: String,
    pub sequence: u64,
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.topic, self.sequence)
    }
}

/// 一次投递
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: DeliveryId,
    pub message: TopicMessage,
    /// 传输层重投次数（被否认或消费者离开后再次投递）
    pub redelivery_count: u32,
}

#[async_trait]
pub trait StreamConsumer: Send {
    /// 接收下一条投递；取消安全；消费者关闭后返回 `None`
    async fn receive(&mut self) -> Option<Delivery>;

    async fn ack(&mut self, id: &DeliveryId) -> Result<()>;

    /// 否认：交还传输层重新投递
    async fn nack(&mut self, id: &DeliveryId) -> Result<()>;

    /// 脱离订阅；未确认的投递交还给其他消费者
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn publish(&self, topic: &str, messages: &[TopicMessage]) -> Result<()>;

    async fn subscribe(&self, config: &SubscriptionConfig) -> Result<Box<dyn StreamConsumer>>;
}

#[async_trait]
pub trait TopicAdmin: Send + Sync {
    async fn create_topic(&self, topic: &str) -> Result<()>;

    async fn delete_topic(&self, topic: &str) -> Result<()>;

    async fn topic_exists(&self, topic: &str) -> Result<bool>;
}

#[async_trait]
impl<T: StreamTransport + ?Sized> StreamTransport for Arc<T> {
    async fn publish(&self, topic: &str, messages: &[TopicMessage]) -> Result<()> {
        (**self).publish(topic, messages).await
    }

    async fn subscribe(&self, config: &SubscriptionConfig) -> Result<Box<dyn StreamConsumer>> {
        (**self).subscribe(config).await
    }
}
