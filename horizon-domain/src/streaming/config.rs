//! 订阅配置（SubscriptionConfig）
//!
//! 构建后不可变；构建前由纯函数 `validate` 校验。
//!
use super::{BackoffStrategy, TypeRegistry};
use crate::error::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// 订阅拓扑
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    /// 每个订阅名只允许一个消费者
    Exclusive,
    /// 轮询分发，无 key 亲和
    Shared,
    /// 首个消费者为主，其余待命
    Failover,
    /// 同一聚合标识始终交给同一消费者
    #[default]
    KeyShared,
}

/// 新建订阅的起始位置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
    #[default]
    Beginning,
    Latest,
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub(crate) topics: Vec<String>,
    pub(crate) type_registry: TypeRegistry,
    pub(crate) subscription_name: String,
    pub(crate) subscription_type: SubscriptionType,
    pub(crate) batch_size: usize,
    pub(crate) max_batch_wait: Duration,
    pub(crate) start_position: StartPosition,
    pub(crate) redeliver_failed_messages: bool,
    pub(crate) ordering_guaranteed_on_failure: bool,
    pub(crate) backoff: Option<Arc<dyn BackoffStrategy>>,
}

impl SubscriptionConfig {
    /// 校验配置组合
    pub fn validate(&self) -> DomainResult<()> {
        if self.topics.is_empty() {
            return Err(DomainError::invalid_config(
                "subscription requires at least one topic",
            ));
        }
        if self.subscription_name.trim().is_empty() {
            return Err(DomainError::invalid_config(
                "subscription name must not be empty",
            ));
        }
        if self.batch_size == 0 {
            return Err(DomainError::invalid_config("batch size must be positive"));
        }
        if !self.redeliver_failed_messages && self.ordering_guaranteed_on_failure {
            return Err(DomainError::invalid_config(
                "ordering on failure requires redelivery of failed messages",
            ));
        }
        if !self.redeliver_failed_messages && self.backoff.is_some() {
            return Err(DomainError::invalid_config(
                "backoff strategy requires redelivery of failed messages",
            ));
        }
        Ok(())
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.type_registry
    }

    pub fn subscription_name(&self) -> &str {
        &self.subscription_name
    }

    pub fn subscription_type(&self) -> SubscriptionType {
        self.subscription_type
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_batch_wait(&self) -> Duration {
        self.max_batch_wait
    }

    pub fn start_position(&self) -> StartPosition {
        self.start_position
    }

    pub fn redeliver_failed_messages(&self) -> bool {
        self.redeliver_failed_messages
    }

    pub fn ordering_guaranteed_on_failure(&self) -> bool {
        self.ordering_guaranteed_on_failure
    }

    pub fn backoff(&self) -> Option<&Arc<dyn BackoffStrategy>> {
        self.backoff.as_ref()
    }
}
