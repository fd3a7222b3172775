//! 流客户端（StreamingClient）
//!
//! 聚合传输、主题管理与主题命名，作为订阅与发布的统一入口。
//!
use super::{StreamTransport, SubscriptionBuilder, TopicAdmin};
use crate::error::DomainResult as Result;
use crate::message::{Action, AggregateKey, MessageKind, TopicMessage, TopicResolver};
use crate::state::State;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct StreamingClient {
    transport: Arc<dyn StreamTransport>,
    admin: Arc<dyn TopicAdmin>,
    resolver: TopicResolver,
}

impl StreamingClient {
    pub fn new<T>(transport: Arc<T>) -> Self
    where
        T: StreamTransport + TopicAdmin + 'static,
    {
        Self {
            transport: transport.clone(),
            admin: transport,
            resolver: TopicResolver::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: TopicResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn resolver(&self) -> &TopicResolver {
        &self.resolver
    }

    pub fn transport(&self) -> Arc<dyn StreamTransport> {
        self.transport.clone()
    }

    pub fn admin(&self) -> Arc<dyn TopicAdmin> {
        self.admin.clone()
    }

    pub fn subscription(&self) -> SubscriptionBuilder {
        SubscriptionBuilder::new(self.transport.clone(), self.resolver.clone())
    }

    pub fn publisher(&self, topic: impl Into<String>) -> Publisher {
        Publisher {
            transport: self.transport.clone(),
            topic: topic.into(),
        }
    }

    /// 状态类型对应的主题名
    pub fn topic_for<S: State>(&self, kind: MessageKind, sender_id: Option<&str>) -> String {
        self.resolver.topic(kind, S::TYPE, sender_id)
    }
}

/// 绑定到单一主题的发布者
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn StreamTransport>,
    topic: String,
}

impl Publisher {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish(&self, messages: &[TopicMessage]) -> Result<()> {
        debug!(topic = %self.topic, count = messages.len(), "publishing");
        self.transport.publish(&self.topic, messages).await
    }

    /// 编码并发布单个动作，返回已发布的消息
    pub async fn publish_action<A: Action>(
        &self,
        kind: MessageKind,
        key: impl Into<AggregateKey>,
        action: &A,
        sender_id: Option<&str>,
    ) -> Result<TopicMessage> {
        let mut message = TopicMessage::encode(kind, key, action)?;
        if let Some(sender) = sender_id {
            message = message.with_sender(sender);
        }
        self.publish(std::slice::from_ref(&message)).await?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::testing::{Account, AccountCommand};
    use crate::streaming::InMemoryTransport;

    #[tokio::test]
    async fn publishes_to_state_topic() {
        let transport = Arc::new(InMemoryTransport::new());
        let client = StreamingClient::new(transport.clone());

        let topic = client.topic_for::<Account>(MessageKind::Command, None);
        assert_eq!(topic, "horizon/command/account");
        assert!(!client.admin().topic_exists(&topic).await.unwrap());

        let published = client
            .publisher(&topic)
            .publish_action(
                MessageKind::Command,
                "acct-1",
                &AccountCommand::Deposit { amount: 5 },
                Some("teller"),
            )
            .await
            .unwrap();

        let log = transport.topic_messages(&topic);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].id(), published.id());
        assert_eq!(log[0].sender_id(), Some("teller"));
        assert!(client.admin().topic_exists(&topic).await.unwrap());
    }
}
