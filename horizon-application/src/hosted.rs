//! 托管服务（HostedService）
//!
//! 将状态类型装配为长驻的订阅服务：
//! - `add_snapshot`：命令流与请求流各一个服务，共享快照存储与锁存储；
//! - `add_view`：事件流驱动视图；
//! - `add_migration`：源状态的事件流驱动目标快照。
//!
//! `Host::stop` 先停止全部订阅，再释放本进程仍持有的锁。
//!
use crate::config::ProcessingConfig;
use crate::error::{AppError, AppResult};
use crate::registry::StateRegistry;
use crate::service::AggregateService;
use crate::store_factory::StoreFactory;
use async_trait::async_trait;
use horizon_domain::aggregator::{MigrationAggregator, Reducer, SnapshotAggregator, ViewAggregator};
use horizon_domain::lock::LockFactory;
use horizon_domain::message::MessageKind;
use horizon_domain::state::{Migrate, Snapshot, State, View};
use horizon_domain::streaming::{StreamingClient, SubscriptionBuilder, SubscriptionHandle};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[async_trait]
pub trait HostedService: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> AppResult<()>;

    async fn stop(&self) -> AppResult<()>;
}

type Streams = fn(SubscriptionBuilder) -> SubscriptionBuilder;

fn commands<S: State>(builder: SubscriptionBuilder) -> SubscriptionBuilder {
    builder.add_state_stream::<S>(MessageKind::Command, None)
}

fn requests<S: State>(builder: SubscriptionBuilder) -> SubscriptionBuilder {
    builder.add_state_stream::<S>(MessageKind::Request, None)
}

fn events<S: State>(builder: SubscriptionBuilder) -> SubscriptionBuilder {
    builder.add_state_stream::<S>(MessageKind::Event, None)
}

/// 一个订阅 + 一个聚合处理服务
pub struct AggregateStateHostedService<R: Reducer> {
    name: String,
    service: Arc<AggregateService<R>>,
    client: StreamingClient,
    config: ProcessingConfig,
    streams: Streams,
    handle: Mutex<Option<SubscriptionHandle>>,
}

impl<R: Reducer> AggregateStateHostedService<R> {
    fn new(
        service: AggregateService<R>,
        client: StreamingClient,
        config: ProcessingConfig,
        streams: Streams,
    ) -> Self {
        Self {
            name: service.name().to_string(),
            service: Arc::new(service),
            client,
            config,
            streams,
            handle: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<R: Reducer> HostedService for AggregateStateHostedService<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> AppResult<()> {
        let mut slot = self.handle.lock().await;
        if slot.is_some() {
            return Err(AppError::AlreadyStarted);
        }

        let builder = self.config.configure(self.client.subscription());
        let subscription = (self.streams)(builder)
            .subscription_name(self.name.clone())
            .on_batch(self.service.clone())
            .build()?;
        *slot = Some(subscription.start().await?);
        Ok(())
    }

    async fn stop(&self) -> AppResult<()> {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.stop().await;
        }
        Ok(())
    }
}

/// 托管服务宿主
pub struct Host<F: StoreFactory> {
    factory: Arc<F>,
    client: StreamingClient,
    registry: Arc<StateRegistry>,
    config: ProcessingConfig,
    services: Vec<Box<dyn HostedService>>,
    locks: Vec<LockFactory>,
}

impl<F: StoreFactory> Host<F> {
    pub fn new(factory: Arc<F>, client: StreamingClient, config: ProcessingConfig) -> Self {
        let client = client.with_resolver(config.resolver());
        Self {
            factory,
            client,
            registry: Arc::new(StateRegistry::new()),
            config,
            services: Vec::new(),
            locks: Vec::new(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<StateRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn client(&self) -> &StreamingClient {
        &self.client
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name()).collect()
    }

    fn service_name(&self, state_type: &str, role: &str) -> String {
        format!("{}-{}-{}", self.config.application_name, state_type, role)
    }

    fn client_for<S: State>(&self) -> StreamingClient {
        let resolver = self.registry.binding::<S>().resolver(self.client.resolver());
        self.client.clone().with_resolver(resolver)
    }

    fn lock_factory(&mut self, database: &str) -> AppResult<LockFactory> {
        let locks = LockFactory::new(self.factory.lock_store(database)?);
        self.locks.push(locks.clone());
        Ok(locks)
    }

    fn push<R: Reducer>(
        &mut self,
        service: AggregateService<R>,
        client: StreamingClient,
        streams: Streams,
    ) {
        self.services.push(Box::new(AggregateStateHostedService::new(
            service,
            client,
            self.config.clone(),
            streams,
        )));
    }

    /// 快照：命令服务与请求服务
    pub fn add_snapshot<S: State>(&mut self) -> AppResult<&mut Self> {
        let binding = self.registry.binding::<S>();
        let client = self.client_for::<S>();
        let store = self
            .factory
            .store::<Snapshot<S>>(binding.snapshot_database())?;
        let locks = self.lock_factory(binding.snapshot_database())?;

        for (role, streams) in [
            ("snapshot-command", commands::<S> as Streams),
            ("snapshot-request", requests::<S> as Streams),
        ] {
            let service = AggregateService::builder()
                .name(self.service_name(S::TYPE, role))
                .reducer(SnapshotAggregator::<S>::new(client.resolver().clone()))
                .store(store.clone())
                .locks(locks.clone())
                .transport(client.transport())
                .config(self.config.clone())
                .build();
            self.push(service, client.clone(), streams);
        }
        Ok(self)
    }

    /// 视图：事件服务
    pub fn add_view<S: State>(&mut self) -> AppResult<&mut Self> {
        let binding = self.registry.binding::<S>();
        let client = self.client_for::<S>();
        let store = self.factory.store::<View<S>>(binding.view_database())?;
        let locks = self.lock_factory(binding.view_database())?;

        let service = AggregateService::builder()
            .name(self.service_name(S::TYPE, "view"))
            .reducer(ViewAggregator::<S>::new())
            .store(store)
            .locks(locks)
            .transport(client.transport())
            .config(self.config.clone())
            .build();
        self.push(service, client, events::<S>);
        Ok(self)
    }

    /// 迁移：订阅源状态的事件流，写入目标快照库
    pub fn add_migration<Source, Target>(&mut self) -> AppResult<&mut Self>
    where
        Source: State,
        Target: Migrate<Source>,
    {
        let binding = self.registry.binding::<Target>();
        let client = self.client_for::<Source>();
        let store = self
            .factory
            .store::<Snapshot<Target>>(binding.snapshot_database())?;
        let locks = self.lock_factory(binding.snapshot_database())?;

        let service = AggregateService::builder()
            .name(self.service_name(
                Target::TYPE,
                &format!("migration-from-{}", Source::TYPE),
            ))
            .reducer(MigrationAggregator::<Source, Target>::new())
            .store(store)
            .locks(locks)
            .transport(client.transport())
            .config(self.config.clone())
            .build();
        self.push(service, client, events::<Source>);
        Ok(self)
    }

    pub async fn start(&self) -> AppResult<()> {
        for service in &self.services {
            service.start().await?;
            info!(service = %service.name(), "hosted service started");
        }
        Ok(())
    }

    /// 停止全部服务并释放持有的锁，返回遇到的第一个错误
    pub async fn stop(&self) -> AppResult<()> {
        let mut first_err: Option<AppError> = None;

        for service in self.services.iter().rev() {
            if let Err(err) = service.stop().await {
                warn!(service = %service.name(), error = %err, "hosted service failed to stop");
                first_err.get_or_insert(err);
            }
        }
        for locks in &self.locks {
            if let Err(err) = locks.release_all().await {
                first_err.get_or_insert(err.into());
            }
        }
        info!(services = self.services.len(), "host stopped");

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
