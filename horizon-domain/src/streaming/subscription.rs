//! 订阅引擎（Subscription）
//!
//! 将消费者的逐条投递组装成批，交给 `BatchHandler` 处理，并依据按聚合标识的结果：
//! - 成功：确认；
//! - 失败且允许重投：按退避策略延迟后再次组批；
//! - 失败且不重投：记录告警后确认；
//! - 开启失败保序时，失败 key 的后续消息在其重投成功前不会被派发。
//!
//! 组批规则：达到 `batch_size` 立即派发；否则自首条入批起最多等待 `max_batch_wait`。
//! 停止为协作式：进行中的批处理完成后，未处理的投递交还传输层。
//!
//! 本地积压达到 `MAX_BUFFERED_BATCHES` 个批的容量后暂停接收，
//! 避免被阻塞的 key 让后续消息无限堆积在内存中。
//!
use super::{
    Batch, BatchHandler, Delivery, StreamConsumer, StreamTransport, SubscriptionConfig,
};
use crate::error::DomainResult;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 本地积压上限（以批为单位）
pub const MAX_BUFFERED_BATCHES: usize = 4;

pub struct Subscription {
    config: SubscriptionConfig,
    transport: Arc<dyn StreamTransport>,
    handler: Arc<dyn BatchHandler>,
}

impl Subscription {
    pub(crate) fn new(
        config: SubscriptionConfig,
        transport: Arc<dyn StreamTransport>,
        handler: Arc<dyn BatchHandler>,
    ) -> Self {
        Self {
            config,
            transport,
            handler,
        }
    }

    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    /// 挂载消费者并启动派发任务
    pub async fn start(self) -> DomainResult<SubscriptionHandle> {
        let consumer = self.transport.subscribe(&self.config).await?;
        let name = self.config.subscription_name().to_string();
        let token = CancellationToken::new();

        info!(subscription = %name, topics = ?self.config.topics(), "subscription started");

        let dispatcher = Dispatcher::new(self.config, consumer, self.handler);
        let task = tokio::spawn(dispatcher.run(token.clone()));

        Ok(SubscriptionHandle {
            name,
            token,
            task: Some(task),
        })
    }
}

/// 订阅运行句柄：丢弃时请求停止
pub struct SubscriptionHandle {
    name: String,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// 请求停止并等待派发任务退出
    pub async fn stop(self) {
        self.shutdown();
        self.join().await;
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Entry {
    delivery: Delivery,
    /// 引擎内已失败次数
    attempt: u32,
}

struct Retry {
    entry: Entry,
    ready_at: Instant,
}

enum Fill {
    Batch(Vec<Entry>),
    Stopped(Vec<Entry>),
    Closed,
}

struct Dispatcher {
    config: SubscriptionConfig,
    consumer: Box<dyn StreamConsumer>,
    handler: Arc<dyn BatchHandler>,
    backlog: VecDeque<Delivery>,
    retries: VecDeque<Retry>,
    closed: bool,
}

impl Dispatcher {
    fn new(
        config: SubscriptionConfig,
        consumer: Box<dyn StreamConsumer>,
        handler: Arc<dyn BatchHandler>,
    ) -> Self {
        Self {
            config,
            consumer,
            handler,
            backlog: VecDeque::new(),
            retries: VecDeque::new(),
            closed: false,
        }
    }

    async fn run(mut self, token: CancellationToken) {
        loop {
            match self.fill(&token).await {
                Fill::Batch(batch) => self.dispatch(batch).await,
                Fill::Stopped(batch) => {
                    self.drain(batch).await;
                    break;
                }
                Fill::Closed => {
                    debug!(subscription = %self.config.subscription_name(), "consumer closed");
                    break;
                }
            }
        }
        info!(subscription = %self.config.subscription_name(), "subscription stopped");
    }

    /// 开启失败保序时，仍有待重投消息的 key
    fn blocked_keys(&self) -> HashSet<String> {
        if !self.config.ordering_guaranteed_on_failure() {
            return HashSet::new();
        }
        self.retries
            .iter()
            .map(|r| r.entry.delivery.message.stream_id().to_string())
            .collect()
    }

    fn backlog_full(&self) -> bool {
        self.backlog.len() >= self.config.batch_size().saturating_mul(MAX_BUFFERED_BATCHES)
    }

    fn take_ready(&mut self, batch: &mut Vec<Entry>, now: Instant) {
        let cap = self.config.batch_size();

        let mut i = 0;
        while i < self.retries.len() && batch.len() < cap {
            if self.retries[i].ready_at <= now {
                if let Some(retry) = self.retries.remove(i) {
                    batch.push(retry.entry);
                }
            } else {
                i += 1;
            }
        }

        let blocked = self.blocked_keys();
        let mut i = 0;
        while i < self.backlog.len() && batch.len() < cap {
            if blocked.contains(self.backlog[i].message.stream_id()) {
                i += 1;
                continue;
            }
            if let Some(delivery) = self.backlog.remove(i) {
                batch.push(Entry {
                    delivery,
                    attempt: 0,
                });
            }
        }
    }

    async fn fill(&mut self, token: &CancellationToken) -> Fill {
        let mut batch: Vec<Entry> = Vec::new();
        let mut deadline: Option<Instant> = None;

        loop {
            if token.is_cancelled() {
                return Fill::Stopped(batch);
            }

            let now = Instant::now();
            self.take_ready(&mut batch, now);
            if !batch.is_empty() {
                let at = *deadline.get_or_insert(now + self.config.max_batch_wait());
                if batch.len() >= self.config.batch_size() || at <= now {
                    return Fill::Batch(batch);
                }
            }

            let next_retry = self.retries.iter().map(|r| r.ready_at).min();
            let wake = match (deadline, next_retry) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            if self.closed && wake.is_none() {
                return if batch.is_empty() {
                    Fill::Closed
                } else {
                    Fill::Batch(batch)
                };
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return Fill::Stopped(batch),
                received = self.consumer.receive(), if !self.closed && !self.backlog_full() => match received {
                    Some(delivery) => {
                        if self.config.type_registry().accepts(delivery.message.type_name()) {
                            self.backlog.push_back(delivery);
                        } else {
                            debug!(
                                subscription = %self.config.subscription_name(),
                                type_name = %delivery.message.type_name(),
                                "skipping unregistered message type"
                            );
                            if let Err(err) = self.consumer.ack(&delivery.id).await {
                                warn!(delivery = %delivery.id, error = %err, "ack failed");
                            }
                        }
                    }
                    None => self.closed = true,
                },
                _ = time::sleep_until(wake.unwrap_or(now)), if wake.is_some() => {}
            }
        }
    }

    async fn dispatch(&mut self, batch: Vec<Entry>) {
        let name = self.config.subscription_name().to_string();
        let messages = batch.iter().map(|e| e.delivery.message.clone()).collect();
        let batch_view = Batch::new(messages);

        let failures: HashMap<String, String> = match self.handler.on_batch(&batch_view).await {
            Ok(result) => result.failed,
            Err(err) => {
                warn!(subscription = %name, size = batch.len(), error = %err, "batch handler failed");
                let reason = err.to_string();
                batch_view
                    .group_by_key()
                    .into_iter()
                    .map(|(key, _)| (key, reason.clone()))
                    .collect()
            }
        };

        let redeliver = self.config.redeliver_failed_messages();
        let mut failed: Vec<(String, Vec<Entry>)> = Vec::new();

        for mut entry in batch {
            let key = entry.delivery.message.stream_id().to_string();
            let Some(reason) = failures.get(&key) else {
                self.ack(&entry.delivery).await;
                continue;
            };

            if !redeliver {
                warn!(subscription = %name, key = %key, reason = %reason, "dropping failed message");
                self.ack(&entry.delivery).await;
                continue;
            }

            entry.attempt += 1;
            warn!(
                subscription = %name,
                key = %key,
                attempt = entry.attempt,
                reason = %reason,
                "message failed, scheduling redelivery"
            );
            match failed.iter_mut().find(|(k, _)| *k == key) {
                Some((_, entries)) => entries.push(entry),
                None => failed.push((key, vec![entry])),
            }
        }

        self.schedule(failed);
    }

    fn delay_for(&self, attempt: u32) -> time::Duration {
        self.config
            .backoff()
            .map(|b| b.delay(attempt))
            .unwrap_or_default()
    }

    fn schedule(&mut self, failed: Vec<(String, Vec<Entry>)>) {
        let now = Instant::now();

        if !self.config.ordering_guaranteed_on_failure() {
            for entry in failed.into_iter().flat_map(|(_, entries)| entries) {
                let ready_at = now + self.delay_for(entry.attempt);
                self.retries.push_back(Retry { entry, ready_at });
            }
            return;
        }

        // 保序：同一 key 的失败消息与其尚在等待的重投合并，共享同一就绪时间
        for (key, mut entries) in failed {
            let mut rest = VecDeque::new();
            for retry in std::mem::take(&mut self.retries) {
                if retry.entry.delivery.message.stream_id() == key {
                    entries.push(retry.entry);
                } else {
                    rest.push_back(retry);
                }
            }
            self.retries = rest;

            let attempt = entries.iter().map(|e| e.attempt).max().unwrap_or(1);
            let ready_at = now + self.delay_for(attempt);
            self.retries
                .extend(entries.into_iter().map(|entry| Retry { entry, ready_at }));
        }
    }

    async fn ack(&mut self, delivery: &Delivery) {
        if let Err(err) = self.consumer.ack(&delivery.id).await {
            warn!(delivery = %delivery.id, error = %err, "ack failed");
        }
    }

    /// 停止：未处理的投递全部交还传输层
    async fn drain(&mut self, batch: Vec<Entry>) {
        let mut returned: Vec<Delivery> = batch.into_iter().map(|e| e.delivery).collect();
        returned.extend(self.retries.drain(..).map(|r| r.entry.delivery));
        returned.extend(self.backlog.drain(..));

        for delivery in &returned {
            if let Err(err) = self.consumer.nack(&delivery.id).await {
                warn!(delivery = %delivery.id, error = %err, "nack failed");
            }
        }
        if let Err(err) = self.consumer.close().await {
            warn!(subscription = %self.config.subscription_name(), error = %err, "close failed");
        }
        debug!(
            subscription = %self.config.subscription_name(),
            returned = returned.len(),
            "returned undispatched deliveries"
        );
    }
}
