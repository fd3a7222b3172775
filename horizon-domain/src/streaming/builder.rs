//! 订阅构建器（SubscriptionBuilder）
//!
//! 以链式指令累积订阅设置，`build` 时一次性校验并冻结为 `SubscriptionConfig`。
//!
use super::{
    BackoffStrategy, BatchHandler, ConstantBackoff, StartPosition, StreamTransport, Subscription,
    SubscriptionConfig, SubscriptionType, TypeRegistry,
};
use crate::error::{DomainError, DomainResult};
use crate::message::{Action, MessageKind, RESPONSE_TYPE, TopicResolver};
use crate::state::State;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_MAX_BATCH_WAIT: Duration = Duration::from_millis(10);

pub struct SubscriptionBuilder {
    transport: Arc<dyn StreamTransport>,
    resolver: TopicResolver,
    topics: Vec<String>,
    type_registry: TypeRegistry,
    subscription_name: String,
    subscription_type: SubscriptionType,
    batch_size: usize,
    max_batch_wait: Duration,
    start_position: StartPosition,
    redeliver_failed_messages: bool,
    ordering_guaranteed_on_failure: bool,
    backoff: Option<Arc<dyn BackoffStrategy>>,
    handler: Option<Arc<dyn BatchHandler>>,
}

impl SubscriptionBuilder {
    pub fn new(transport: Arc<dyn StreamTransport>, resolver: TopicResolver) -> Self {
        Self {
            transport,
            resolver,
            topics: Vec::new(),
            type_registry: TypeRegistry::new(),
            subscription_name: String::new(),
            subscription_type: SubscriptionType::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_batch_wait: DEFAULT_MAX_BATCH_WAIT,
            start_position: StartPosition::default(),
            redeliver_failed_messages: true,
            ordering_guaranteed_on_failure: false,
            backoff: Some(Arc::new(ConstantBackoff::default())),
            handler: None,
        }
    }

    /// 按主题名订阅原始消息
    pub fn add_topic(mut self, topic: impl Into<String>) -> Self {
        self.topics.push(topic.into());
        self
    }

    /// 订阅一个主题，并登记该主题承载的动作类型
    pub fn add_stream<A: Action>(
        mut self,
        topic: impl Into<String>,
        kind: MessageKind,
        state_type: &str,
    ) -> Self {
        self.topics.push(topic.into());
        self.type_registry.register::<A>(kind, state_type);
        self
    }

    /// 订阅某个状态类型的命令/事件/请求/响应流
    ///
    /// 响应流需携带请求方标识，其主题带 `-{sender}` 后缀。
    pub fn add_state_stream<S: State>(mut self, kind: MessageKind, sender_id: Option<&str>) -> Self {
        let topic = self.resolver.topic(kind, S::TYPE, sender_id);
        self.topics.push(topic);
        match kind {
            MessageKind::Command => {
                self.type_registry.register::<S::Command>(kind, S::TYPE);
            }
            MessageKind::Event => {
                self.type_registry.register::<S::Event>(kind, S::TYPE);
            }
            MessageKind::Request => {
                self.type_registry.register::<S::Request>(kind, S::TYPE);
            }
            MessageKind::Response => {
                self.type_registry.register_name(RESPONSE_TYPE, kind, S::TYPE);
            }
        }
        self
    }

    pub fn subscription_name(mut self, name: impl Into<String>) -> Self {
        self.subscription_name = name.into();
        self
    }

    pub fn subscription_type(mut self, kind: SubscriptionType) -> Self {
        self.subscription_type = kind;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn max_batch_wait(mut self, wait: Duration) -> Self {
        self.max_batch_wait = wait;
        self
    }

    pub fn start_position(mut self, position: StartPosition) -> Self {
        self.start_position = position;
        self
    }

    pub fn redeliver_failed_messages(mut self, redeliver: bool) -> Self {
        self.redeliver_failed_messages = redeliver;
        self
    }

    pub fn guarantee_message_order_on_failure(mut self, ordered: bool) -> Self {
        self.ordering_guaranteed_on_failure = ordered;
        self
    }

    /// 设置重投退避；`None` 表示失败后立即重投
    pub fn backoff_strategy(mut self, backoff: Option<Arc<dyn BackoffStrategy>>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn on_batch(mut self, handler: impl BatchHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// 冻结并校验配置（主题去重，保留首次出现顺序）
    pub fn build_config(&self) -> DomainResult<SubscriptionConfig> {
        let mut topics: Vec<String> = Vec::with_capacity(self.topics.len());
        for topic in &self.topics {
            if !topics.contains(topic) {
                topics.push(topic.clone());
            }
        }

        let config = SubscriptionConfig {
            topics,
            type_registry: self.type_registry.clone(),
            subscription_name: self.subscription_name.clone(),
            subscription_type: self.subscription_type,
            batch_size: self.batch_size,
            max_batch_wait: self.max_batch_wait,
            start_position: self.start_position,
            redeliver_failed_messages: self.redeliver_failed_messages,
            ordering_guaranteed_on_failure: self.ordering_guaranteed_on_failure,
            backoff: self.backoff.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn build(self) -> DomainResult<Subscription> {
        let config = self.build_config()?;
        let handler = self
            .handler
            .ok_or_else(|| DomainError::invalid_config("subscription requires a batch handler"))?;
        Ok(Subscription::new(config, self.transport, handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::testing::Account;
    use crate::streaming::InMemoryTransport;

    fn builder() -> SubscriptionBuilder {
        SubscriptionBuilder::new(Arc::new(InMemoryTransport::new()), TopicResolver::default())
    }

    #[test]
    fn defaults_and_dedup() {
        let config = builder()
            .add_state_stream::<Account>(MessageKind::Command, None)
            .add_state_stream::<Account>(MessageKind::Command, None)
            .add_state_stream::<Account>(MessageKind::Response, Some("teller"))
            .subscription_name("account-commands")
            .build_config()
            .unwrap();

        assert_eq!(
            config.topics(),
            &[
                "horizon/command/account".to_string(),
                "horizon/response/account-teller".to_string()
            ]
        );
        assert_eq!(config.batch_size(), DEFAULT_BATCH_SIZE);
        assert_eq!(config.max_batch_wait(), DEFAULT_MAX_BATCH_WAIT);
        assert_eq!(config.subscription_type(), SubscriptionType::KeyShared);
        assert_eq!(config.start_position(), StartPosition::Beginning);
        assert!(config.redeliver_failed_messages());
        assert!(!config.ordering_guaranteed_on_failure());
        assert!(config.backoff().is_some());
        assert!(config.type_registry().accepts("AccountCommand.Deposit"));
        assert!(config.type_registry().accepts(RESPONSE_TYPE));
        assert!(!config.type_registry().accepts("AccountEvent.Deposited"));
    }

    #[test]
    fn rejects_invalid_combinations() {
        let no_topic = builder().subscription_name("s").build_config();
        assert!(matches!(no_topic, Err(DomainError::InvalidConfig { .. })));

        let no_name = builder().add_topic("t").build_config();
        assert!(matches!(no_name, Err(DomainError::InvalidConfig { .. })));

        let zero = builder()
            .add_topic("t")
            .subscription_name("s")
            .batch_size(0)
            .build_config();
        assert!(matches!(zero, Err(DomainError::InvalidConfig { .. })));

        let ordered_without_redelivery = builder()
            .add_topic("t")
            .subscription_name("s")
            .redeliver_failed_messages(false)
            .backoff_strategy(None)
            .guarantee_message_order_on_failure(true)
            .build_config();
        assert!(matches!(
            ordered_without_redelivery,
            Err(DomainError::InvalidConfig { .. })
        ));

        let backoff_without_redelivery = builder()
            .add_topic("t")
            .subscription_name("s")
            .redeliver_failed_messages(false)
            .build_config();
        assert!(matches!(
            backoff_without_redelivery,
            Err(DomainError::InvalidConfig { .. })
        ));

        let dropping = builder()
            .add_topic("t")
            .subscription_name("s")
            .redeliver_failed_messages(false)
            .backoff_strategy(None)
            .build_config();
        assert!(dropping.is_ok());
    }

    #[test]
    fn build_requires_handler() {
        let result = builder().add_topic("t").subscription_name("s").build();
        assert!(matches!(result, Err(DomainError::InvalidConfig { .. })));
    }
}
