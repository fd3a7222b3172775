//! 批处理器（BatchHandler）
//!
//! 订阅引擎以批为单位驱动处理器；处理器按聚合标识报告成功与失败。
//!
use crate::error::DomainResult;
use crate::message::{AggregateKey, Output, TopicMessage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// 一批消息，保持到达顺序
#[derive(Debug, Clone, Default)]
pub struct Batch {
    messages: Vec<TopicMessage>,
}

impl Batch {
    pub fn new(messages: Vec<TopicMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[TopicMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 按聚合标识分组：组按首次出现排序，组内保持到达顺序
    pub fn group_by_key(&self) -> Vec<(AggregateKey, Vec<TopicMessage>)> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<(AggregateKey, Vec<TopicMessage>)> = Vec::new();

        for message in &self.messages {
            match index.get(message.stream_id()) {
                Some(&i) => groups[i].1.push(message.clone()),
                None => {
                    index.insert(message.stream_id(), groups.len());
                    groups.push((message.stream_id().to_string(), vec![message.clone()]));
                }
            }
        }
        groups
    }
}

/// 批处理结果
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub succeeded: Vec<AggregateKey>,
    pub failed: HashMap<AggregateKey, String>,
    pub outputs: Vec<Output>,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure(&self, key: &str) -> Option<&str> {
        self.failed.get(key).map(String::as_str)
    }
}

#[async_trait]
pub trait BatchHandler: Send + Sync {
    /// 返回 `Err` 视为整批失败
    async fn on_batch(&self, batch: &Batch) -> DomainResult<BatchResult>;
}

#[async_trait]
impl<T: BatchHandler + ?Sized> BatchHandler for Arc<T> {
    async fn on_batch(&self, batch: &Batch) -> DomainResult<BatchResult> {
        (**self).on_batch(batch).await
    }
}
