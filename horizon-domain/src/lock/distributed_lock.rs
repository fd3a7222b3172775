use crate::error::{DomainError, DomainResult};
use crate::persist::{CrudEntity, CrudStore};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// 锁行：每次获取尝试创建一行，释放时删除或因过期被取代
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    id: String,
    expiration: DateTime<Utc>,
}

impl Lock {
    pub fn new(id: impl Into<String>, expiration: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            expiration,
        }
    }

    pub fn expiration(&self) -> DateTime<Utc> {
        self.expiration
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration < now
    }
}

impl CrudEntity for Lock {
    fn id(&self) -> &str {
        &self.id
    }
}

type HeldLocks = Arc<DashMap<Uuid, Arc<LockState>>>;

/// 锁工厂：绑定锁存储，并记录本进程持有的锁
#[derive(Clone)]
pub struct LockFactory {
    store: Arc<dyn CrudStore<Lock>>,
    held: HeldLocks,
    poll_interval: Duration,
}

impl LockFactory {
    pub fn new(store: Arc<dyn CrudStore<Lock>>) -> Self {
        Self {
            store,
            held: Arc::new(DashMap::new()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn create(&self, id: impl Into<String>, lease: Duration) -> DistributedLock {
        DistributedLock {
            state: Arc::new(LockState {
                handle: Uuid::new_v4(),
                id: id.into(),
                store: self.store.clone(),
                held: self.held.clone(),
                owned: AtomicBool::new(false),
                timer: Mutex::new(None),
            }),
            lease,
            poll_interval: self.poll_interval,
        }
    }

    /// 当前持有的锁数量
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// 释放本进程仍持有的全部锁，返回遇到的第一个错误
    pub async fn release_all(&self) -> DomainResult<()> {
        let states: Vec<Arc<LockState>> = self.held.iter().map(|e| e.value().clone()).collect();
        let mut first_err = None;

        for state in states {
            if let Err(e) = state.release(false).await {
                warn!(lock_id = %state.id, error = %e, "failed to release lock on shutdown");
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct LockState {
    handle: Uuid,
    id: String,
    store: Arc<dyn CrudStore<Lock>>,
    held: HeldLocks,
    owned: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl LockState {
    fn take_timer(&self) -> Option<JoinHandle<()>> {
        self.timer.lock().ok().and_then(|mut slot| slot.take())
    }

    // 计时器任务内调用时不能 abort 自身
    async fn release(&self, from_timer: bool) -> DomainResult<()> {
        if !self.owned.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        self.held.remove(&self.handle);
        if let Some(timer) = self.take_timer() {
            if !from_timer {
                timer.abort();
            }
        }

        self.store.delete(std::slice::from_ref(&self.id)).await?;
        debug!(lock_id = %self.id, "lock released");
        Ok(())
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// 单个聚合 id 上的租约锁
pub struct DistributedLock {
    state: Arc<LockState>,
    lease: Duration,
    poll_interval: Duration,
}

impl DistributedLock {
    pub fn id(&self) -> &str {
        &self.state.id
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    pub fn is_owned(&self) -> bool {
        self.state.owned.load(Ordering::Acquire)
    }

    /// 尝试获取一次；存储不可用时返回 `Err`，绝不视为获得
    pub async fn try_acquire(&self) -> DomainResult<bool> {
        if self.is_owned() {
            return Ok(true);
        }

        let lease = chrono::Duration::from_std(self.lease)
            .map_err(|e| DomainError::invalid_config(format!("lock lease: {e}")))?;
        let row = Lock::new(self.state.id.clone(), Utc::now() + lease);
        let result = self.state.store.insert(std::slice::from_ref(&row)).await?;

        let granted = if result.is_ok() {
            true
        } else {
            let current = self
                .state
                .store
                .get_all(std::slice::from_ref(&self.state.id))
                .await?;
            match current.first() {
                Some(existing) if existing.is_expired(Utc::now()) => {
                    debug!(
                        lock_id = %self.state.id,
                        expired_at = %existing.expiration(),
                        "reclaiming expired lock"
                    );
                    true
                }
                _ => false,
            }
        };

        if granted {
            self.grant();
        }
        Ok(granted)
    }

    fn grant(&self) {
        self.state.owned.store(true, Ordering::Release);
        self.state
            .held
            .insert(self.state.handle, self.state.clone());

        let state = self.state.clone();
        let lease = self.lease;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(lease).await;
            if state.owned.load(Ordering::Acquire) {
                warn!(lock_id = %state.id, lease_ms = %lease.as_millis(), "lease elapsed, releasing lock");
            }
            if let Err(e) = state.release(true).await {
                warn!(lock_id = %state.id, error = %e, "failed to release expired lock");
            }
        });

        if let Ok(mut slot) = self.state.timer.lock() {
            if let Some(previous) = slot.replace(timer) {
                previous.abort();
            }
        }
    }

    /// 轮询直至获得
    pub async fn wait_acquire(&self) -> DomainResult<()> {
        loop {
            if self.try_acquire().await? {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// 轮询直至获得或超时；超时只在两次尝试之间判定，不会中断进行中的插入
    ///
    /// 超时大到无法表示为截止时刻时等同于 `wait_acquire`。
    pub async fn wait_acquire_timeout(&self, timeout: Duration) -> DomainResult<()> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait_acquire().await;
        };
        loop {
            if self.try_acquire().await? {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(DomainError::LockTimeout {
                    id: self.state.id.clone(),
                    waited_ms: saturating_millis(timeout),
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// 幂等释放：仅在持有时删除锁行
    pub async fn release(&self) -> DomainResult<()> {
        self.state.release(false).await
    }
}

impl Drop for DistributedLock {
    fn drop(&mut self) {
        if !self.is_owned() {
            return;
        }
        let state = self.state.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = state.release(false).await {
                    warn!(lock_id = %state.id, error = %e, "failed to release dropped lock");
                }
            });
        }
    }
}
