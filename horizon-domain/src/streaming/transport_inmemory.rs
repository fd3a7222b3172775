//! 内存版流传输（InMemoryTransport）
//!
//! 满足 `StreamTransport` 与 `TopicAdmin` 协议的进程内实现：
//! - 每个主题保存完整日志，发布时赋予主题内序号；
//! - 每个订阅名维护独立游标：未确认集合与待分配积压；
//! - 按订阅拓扑分配消费者（独占/共享轮询/故障转移/按 key 哈希）；
//! - 否认或消费者离开时，未确认消息重新分配；
//! - `tail` 返回 `'static` 生命周期的主题消息流，便于测试观察输出。
//!
//! 典型用途：测试环境、示例与本地开发。
//!
use super::{
    Delivery, DeliveryId, StartPosition, StreamConsumer, StreamTransport, SubscriptionConfig,
    SubscriptionType, TopicAdmin,
};
use crate::error::{DomainError, DomainResult as Result};
use crate::message::TopicMessage;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

const TAIL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct InMemoryTransport {
    inner: Arc<Inner>,
}

struct Inner {
    topics: Mutex<HashMap<String, Topic>>,
    next_consumer: AtomicU64,
    tail: broadcast::Sender<(String, TopicMessage)>,
}

impl Inner {
    fn topics(&self) -> Result<MutexGuard<'_, HashMap<String, Topic>>> {
        self.topics
            .lock()
            .map_err(|_| DomainError::transport("in-memory transport state poisoned"))
    }
}

#[derive(Default)]
struct Topic {
    log: Vec<TopicMessage>,
    subscriptions: HashMap<String, SubscriptionState>,
}

struct ConsumerSlot {
    id: u64,
    tx: mpsc::UnboundedSender<Delivery>,
}

struct Unacked {
    message: TopicMessage,
    consumer: u64,
    redelivery_count: u32,
}

struct Pending {
    message: TopicMessage,
    redelivery_count: u32,
}

struct SubscriptionState {
    kind: SubscriptionType,
    consumers: Vec<ConsumerSlot>,
    unacked: HashMap<u64, Unacked>,
    backlog: VecDeque<Pending>,
    cursor: usize,
}

impl SubscriptionState {
    fn seeded(kind: SubscriptionType, log: &[TopicMessage], start: StartPosition) -> Self {
        let backlog = log
            .iter()
            .filter(|m| match start {
                StartPosition::Beginning => true,
                StartPosition::Latest => false,
                StartPosition::Timestamp(at) => m.occurred_at() >= at,
            })
            .map(|m| Pending {
                message: m.clone(),
                redelivery_count: 0,
            })
            .collect();

        Self {
            kind,
            consumers: Vec::new(),
            unacked: HashMap::new(),
            backlog,
            cursor: 0,
        }
    }

    fn pick(&mut self, key: &str) -> Option<usize> {
        let n = self.consumers.len();
        if n == 0 {
            return None;
        }
        match self.kind {
            SubscriptionType::Exclusive | SubscriptionType::Failover => Some(0),
            SubscriptionType::Shared => {
                let i = self.cursor % n;
                self.cursor = self.cursor.wrapping_add(1);
                Some(i)
            }
            SubscriptionType::KeyShared => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                Some((hasher.finish() % n as u64) as usize)
            }
        }
    }

    fn route(&mut self, topic: &str, message: TopicMessage, redelivery_count: u32) {
        loop {
            let Some(i) = self.pick(message.stream_id()) else {
                self.backlog.push_back(Pending {
                    message,
                    redelivery_count,
                });
                return;
            };

            let delivery = Delivery {
                id: DeliveryId {
                    topic: topic.to_string(),
                    sequence: message.sequence(),
                },
                message: message.clone(),
                redelivery_count,
            };
            let slot = &self.consumers[i];
            if slot.tx.send(delivery).is_ok() {
                self.unacked.insert(
                    message.sequence(),
                    Unacked {
                        message,
                        consumer: slot.id,
                        redelivery_count,
                    },
                );
                return;
            }
            // 接收端已丢弃但未关闭：移除后重新选择
            self.consumers.remove(i);
        }
    }

    fn flush_backlog(&mut self, topic: &str) {
        if self.consumers.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.backlog);
        for p in pending {
            self.route(topic, p.message, p.redelivery_count);
        }
    }

    fn detach(&mut self, topic: &str, consumer: u64) {
        self.consumers.retain(|c| c.id != consumer);

        let mut orphaned: Vec<Unacked> = Vec::new();
        self.unacked.retain(|_, u| {
            if u.consumer == consumer {
                orphaned.push(Unacked {
                    message: u.message.clone(),
                    consumer,
                    redelivery_count: u.redelivery_count,
                });
                false
            } else {
                true
            }
        });
        orphaned.sort_by_key(|u| u.message.sequence());

        for u in orphaned {
            self.route(topic, u.message, u.redelivery_count + 1);
        }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        let (tail, _rx) = broadcast::channel(TAIL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                topics: Mutex::new(HashMap::new()),
                next_consumer: AtomicU64::new(1),
                tail,
            }),
        }
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 主题日志快照
    pub fn topic_messages(&self, topic: &str) -> Vec<TopicMessage> {
        self.inner
            .topics()
            .ok()
            .and_then(|topics| topics.get(topic).map(|t| t.log.clone()))
            .unwrap_or_default()
    }

    /// 订阅中尚未确认（含未分配积压）的消息数
    pub fn pending_count(&self, topic: &str, subscription: &str) -> usize {
        self.inner
            .topics()
            .ok()
            .and_then(|topics| {
                topics
                    .get(topic)
                    .and_then(|t| t.subscriptions.get(subscription))
                    .map(|s| s.unacked.len() + s.backlog.len())
            })
            .unwrap_or(0)
    }

    /// 跟随主题的新消息
    pub fn tail(&self, topic: &str) -> BoxStream<'static, TopicMessage> {
        let topic = topic.to_string();
        let rx = self.inner.tail.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(move |item| {
            let matched = match item {
                Ok((t, message)) if t == topic => Some(message),
                _ => None,
            };
            async move { matched }
        });
        Box::pin(stream)
    }
}

#[async_trait]
impl StreamTransport for InMemoryTransport {
    async fn publish(&self, topic: &str, messages: &[TopicMessage]) -> Result<()> {
        let mut topics = self.inner.topics()?;
        let state = topics.entry(topic.to_string()).or_default();

        for message in messages {
            let stamped = message.clone().with_sequence(state.log.len() as u64);
            state.log.push(stamped.clone());
            for sub in state.subscriptions.values_mut() {
                sub.route(topic, stamped.clone(), 0);
            }
            // 无订阅者时发送失败，视为非致命并忽略
            let _ = self.inner.tail.send((topic.to_string(), stamped));
        }
        Ok(())
    }

    async fn subscribe(&self, config: &SubscriptionConfig) -> Result<Box<dyn StreamConsumer>> {
        let name = config.subscription_name();
        let kind = config.subscription_type();
        let mut topics = self.inner.topics()?;

        for topic in config.topics() {
            let Some(sub) = topics.get(topic).and_then(|t| t.subscriptions.get(name)) else {
                continue;
            };
            if sub.kind != kind {
                return Err(DomainError::transport(format!(
                    "subscription {name} on {topic} already exists as {:?}",
                    sub.kind
                )));
            }
            if kind == SubscriptionType::Exclusive && !sub.consumers.is_empty() {
                return Err(DomainError::transport(format!(
                    "exclusive subscription {name} on {topic} already has a consumer"
                )));
            }
        }

        let id = self.inner.next_consumer.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        for topic in config.topics() {
            let Topic { log, subscriptions } = topics.entry(topic.clone()).or_default();
            let sub = subscriptions
                .entry(name.to_string())
                .or_insert_with(|| SubscriptionState::seeded(kind, log, config.start_position()));
            sub.consumers.push(ConsumerSlot { id, tx: tx.clone() });
            sub.flush_backlog(topic);
        }

        debug!(consumer = id, subscription = %name, topics = ?config.topics(), "consumer attached");

        Ok(Box::new(InMemoryConsumer {
            id,
            inner: self.inner.clone(),
            rx,
            topics: config.topics().to_vec(),
            subscription: name.to_string(),
            closed: false,
        }))
    }
}

#[async_trait]
impl TopicAdmin for InMemoryTransport {
    async fn create_topic(&self, topic: &str) -> Result<()> {
        self.inner.topics()?.entry(topic.to_string()).or_default();
        Ok(())
    }

    async fn delete_topic(&self, topic: &str) -> Result<()> {
        self.inner.topics()?.remove(topic);
        Ok(())
    }

    async fn topic_exists(&self, topic: &str) -> Result<bool> {
        Ok(self.inner.topics()?.contains_key(topic))
    }
}

struct InMemoryConsumer {
    id: u64,
    inner: Arc<Inner>,
    rx: mpsc::UnboundedReceiver<Delivery>,
    topics: Vec<String>,
    subscription: String,
    closed: bool,
}

impl InMemoryConsumer {
    fn with_subscription<T>(
        &self,
        topic: &str,
        f: impl FnOnce(&mut SubscriptionState) -> T,
    ) -> Result<Option<T>> {
        let mut topics = self.inner.topics()?;
        Ok(topics
            .get_mut(topic)
            .and_then(|t| t.subscriptions.get_mut(&self.subscription))
            .map(f))
    }

    fn detach_all(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.rx.close();

        let mut topics = self.inner.topics()?;
        for topic in &self.topics {
            if let Some(sub) = topics
                .get_mut(topic)
                .and_then(|t| t.subscriptions.get_mut(&self.subscription))
            {
                sub.detach(topic, self.id);
            }
        }
        debug!(consumer = self.id, subscription = %self.subscription, "consumer detached");
        Ok(())
    }
}

#[async_trait]
impl StreamConsumer for InMemoryConsumer {
    async fn receive(&mut self) -> Option<Delivery> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    async fn ack(&mut self, id: &DeliveryId) -> Result<()> {
        let consumer = self.id;
        self.with_subscription(&id.topic, |sub| {
            if sub
                .unacked
                .get(&id.sequence)
                .is_some_and(|u| u.consumer == consumer)
            {
                sub.unacked.remove(&id.sequence);
            }
        })?;
        Ok(())
    }

    async fn nack(&mut self, id: &DeliveryId) -> Result<()> {
        let consumer = self.id;
        self.with_subscription(&id.topic, |sub| {
            if sub
                .unacked
                .get(&id.sequence)
                .is_some_and(|u| u.consumer == consumer)
            {
                if let Some(u) = sub.unacked.remove(&id.sequence) {
                    sub.route(&id.topic, u.message, u.redelivery_count + 1);
                }
            }
        })?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.detach_all()
    }
}

impl Drop for InMemoryConsumer {
    fn drop(&mut self) {
        let _ = self.detach_all();
    }
}
