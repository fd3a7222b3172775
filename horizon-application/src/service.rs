//! 聚合处理服务（AggregateService）
//!
//! 作为订阅的批处理器：按聚合标识分组，组间并发、组内串行，对每个 key：
//! 1. 在租约锁内加载状态行（不存在则新建）；
//! 2. 交给归约器依序应用入站消息；
//! 3. 以乐观版本落库（新行插入，旧行按期望版本更新），输出与已应用的消息 id 随行写入；
//! 4. 落库成功后按主题发布输出，再清空行上的 outbox；
//! 5. 无论成败都释放锁。
//!
//! 版本冲突时重新读取并重放，有界重试后上报为存储故障，由订阅重投。
//! 重投到达时，行上已记录的消息不再归约，只补发 outbox 中尚未确认的输出。
//!
use crate::config::ProcessingConfig;
use backon::{BackoffBuilder, ExponentialBuilder};
use bon::Builder;
use futures_util::{StreamExt, stream};
use horizon_domain::aggregator::Reducer;
use horizon_domain::error::{DomainError, DomainResult, FailureKind};
use horizon_domain::lock::LockFactory;
use horizon_domain::message::{InboundMessage, Output, TopicMessage};
use horizon_domain::persist::{CrudEntity, CrudStore, VersionedUpdate};
use horizon_domain::state::Stateful;
use horizon_domain::streaming::{Batch, BatchHandler, BatchResult, StreamTransport};
use horizon_domain::value_object::Version;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const CONFLICT_MIN_DELAY: Duration = Duration::from_millis(5);
const CONFLICT_MAX_DELAY: Duration = Duration::from_millis(500);

#[derive(Builder)]
pub struct AggregateService<R: Reducer> {
    #[builder(into)]
    name: String,
    reducer: R,
    store: Arc<dyn CrudStore<R::Row>>,
    locks: LockFactory,
    transport: Arc<dyn StreamTransport>,
    #[builder(default)]
    config: ProcessingConfig,
}

impl<R: Reducer> AggregateService<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locks(&self) -> &LockFactory {
        &self.locks
    }

    /// 处理单个 key 的有序消息，返回已发布的输出
    pub async fn process_key(
        &self,
        key: &str,
        messages: Vec<TopicMessage>,
    ) -> DomainResult<Vec<Output>> {
        let inbound = messages
            .into_iter()
            .map(|m| self.reducer.classify(m))
            .collect::<DomainResult<Vec<InboundMessage>>>()?;
        if inbound.is_empty() {
            return Ok(Vec::new());
        }

        let lock = self.locks.create(key, self.config.lock_lease());
        lock.wait_acquire_timeout(self.config.lock_wait_timeout())
            .await?;

        let result = self.process_locked(key, &inbound).await;

        if let Err(err) = lock.release().await {
            warn!(service = %self.name, key = %key, error = %err, "failed to release lock");
        }
        result
    }

    async fn process_locked(
        &self,
        key: &str,
        inbound: &[InboundMessage],
    ) -> DomainResult<Vec<Output>> {
        let mut delays = ExponentialBuilder::default()
            .with_min_delay(CONFLICT_MIN_DELAY)
            .with_max_delay(CONFLICT_MAX_DELAY)
            .with_max_times(self.config.max_conflict_retries)
            .build();
        let mut conflicts = 0usize;

        loop {
            let (loaded, mut row) = self.load(key, inbound).await?;

            // 重投的消息已随上次落库生效，只补发其输出
            let fresh: Vec<InboundMessage> = inbound
                .iter()
                .filter(|m| !row.is_applied(m.message().id()))
                .cloned()
                .collect();
            if fresh.len() < inbound.len() {
                debug!(
                    service = %self.name,
                    key = %key,
                    skipped = inbound.len() - fresh.len(),
                    "skipping already applied messages"
                );
            }
            if fresh.is_empty() {
                return self.flush(key, row).await;
            }

            let outputs = self.reduce(&mut row, &fresh)?;
            let ids: Vec<&str> = fresh.iter().map(|m| m.message().id()).collect();
            row.mark_applied(&ids);
            row.stage(outputs);

            match self.persist(key, loaded, &row).await {
                Ok(()) => return self.flush(key, row).await,
                Err(DomainError::VersionConflict { expected, .. }) => {
                    conflicts += 1;
                    let Some(delay) = delays.next() else {
                        return Err(DomainError::store(format!(
                            "version conflict on {key} persisted after {conflicts} attempts"
                        )));
                    };
                    debug!(
                        service = %self.name,
                        key = %key,
                        expected,
                        attempt = conflicts,
                        "version conflict, reloading"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// 读取当前行；不存在时以首条消息的时间新建
    async fn load(
        &self,
        key: &str,
        inbound: &[InboundMessage],
    ) -> DomainResult<(Option<Version>, R::Row)> {
        let rows = self.store.get_all(&[key.to_string()]).await?;
        match rows.into_iter().next() {
            Some(row) => Ok((Some(row.version()), row)),
            None => {
                let at = inbound
                    .first()
                    .map(|m| m.message().occurred_at())
                    .unwrap_or_else(chrono::Utc::now);
                Ok((None, R::Row::create(key, at)))
            }
        }
    }

    fn reduce(&self, row: &mut R::Row, inbound: &[InboundMessage]) -> DomainResult<Vec<Output>> {
        catch_unwind(AssertUnwindSafe(|| self.reducer.reduce(row, inbound))).unwrap_or_else(
            |_| {
                Err(DomainError::aggregator(format!(
                    "{} reducer panicked",
                    self.reducer.state_type()
                )))
            },
        )
    }

    async fn persist(&self, key: &str, loaded: Option<Version>, row: &R::Row) -> DomainResult<()> {
        let result = match loaded {
            None => self.store.insert(std::slice::from_ref(row)).await?,
            Some(expected) => {
                self.store
                    .update(&[VersionedUpdate::new(row.clone(), expected)])
                    .await?
            }
        };

        if result.is_failed(key) {
            return Err(DomainError::VersionConflict {
                id: key.to_string(),
                expected: loaded.unwrap_or_default().value(),
            });
        }
        Ok(())
    }

    /// 发布已落库的待发布输出，成功后清空 outbox
    ///
    /// 发布失败时 outbox 原样留在行上，重投时再次发布，输出 id 不变。
    async fn flush(&self, key: &str, mut row: R::Row) -> DomainResult<Vec<Output>> {
        let pending = row.take_outbox();
        if pending.is_empty() {
            return Ok(pending);
        }
        self.publish(&pending).await?;

        let expected = row.version();
        match self.store.update(&[VersionedUpdate::new(row, expected)]).await {
            Ok(result) if result.is_ok() => {}
            Ok(_) => warn!(
                service = %self.name,
                key = %key,
                "row changed before outbox was cleared, outputs may be published again"
            ),
            Err(err) => warn!(
                service = %self.name,
                key = %key,
                error = %err,
                "failed to clear outbox, outputs may be published again"
            ),
        }
        Ok(pending)
    }

    /// 按主题分组发布，保持组内顺序
    async fn publish(&self, outputs: &[Output]) -> DomainResult<()> {
        let mut groups: Vec<(&str, Vec<TopicMessage>)> = Vec::new();
        for output in outputs {
            match groups.iter_mut().find(|(t, _)| *t == output.topic) {
                Some((_, messages)) => messages.push(output.message.clone()),
                None => groups.push((output.topic.as_str(), vec![output.message.clone()])),
            }
        }

        for (topic, messages) in groups {
            self.transport.publish(topic, &messages).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R: Reducer> BatchHandler for AggregateService<R> {
    async fn on_batch(&self, batch: &Batch) -> DomainResult<BatchResult> {
        let groups = batch.group_by_key();
        debug!(
            service = %self.name,
            size = batch.len(),
            keys = groups.len(),
            "processing batch"
        );

        let results: Vec<(String, DomainResult<Vec<Output>>)> = stream::iter(groups)
            .map(|(key, messages)| async move {
                let result = self.process_key(&key, messages).await;
                (key, result)
            })
            .buffer_unordered(self.config.key_concurrency.max(1))
            .collect()
            .await;

        let mut out = BatchResult::default();
        for (key, result) in results {
            match result {
                Ok(outputs) => {
                    out.outputs.extend(outputs);
                    out.succeeded.push(key);
                }
                Err(err) => {
                    match err.failure_kind() {
                        FailureKind::Fatal => {
                            error!(service = %self.name, key = %key, error = %err, "key failed")
                        }
                        _ => warn!(service = %self.name, key = %key, error = %err, "key failed"),
                    }
                    out.failed.insert(key, err.to_string());
                }
            }
        }
        Ok(out)
    }
}
