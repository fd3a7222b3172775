//! 处理服务配置（ProcessingConfig）
//!
//! 加载顺序（后者覆盖前者）：
//! 1. 内置默认值；
//! 2. 可选的 YAML 文件；
//! 3. `HORIZON__` 前缀的环境变量，层级以 `__` 分隔（如 `HORIZON__BATCH_SIZE=500`、
//!    `HORIZON__BACKOFF__STRATEGY=none`）。
//!
use crate::error::{AppError, AppResult};
use horizon_domain::message::{DEFAULT_NAMESPACE, TopicResolver};
use horizon_domain::streaming::{
    BackoffStrategy, ConstantBackoff, ExponentialBackoff, StartPosition, SubscriptionBuilder,
    SubscriptionType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// 环境变量前缀
pub const CONFIG_ENV_PREFIX: &str = "HORIZON";

/// 重投退避配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffConfig {
    /// 失败后立即重投
    None,
    Constant {
        delay_ms: u64,
    },
    Exponential {
        min_delay_ms: u64,
        max_delay_ms: u64,
        factor: f32,
        #[serde(default)]
        jitter: bool,
    },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Constant { delay_ms: 10 }
    }
}

impl BackoffConfig {
    pub fn strategy(&self) -> Option<Arc<dyn BackoffStrategy>> {
        match *self {
            BackoffConfig::None => None,
            BackoffConfig::Constant { delay_ms } => Some(Arc::new(ConstantBackoff::new(
                Duration::from_millis(delay_ms),
            ))),
            BackoffConfig::Exponential {
                min_delay_ms,
                max_delay_ms,
                factor,
                jitter,
            } => {
                let backoff = ExponentialBackoff::new(
                    Duration::from_millis(min_delay_ms),
                    Duration::from_millis(max_delay_ms),
                    factor,
                );
                Some(Arc::new(if jitter { backoff.with_jitter() } else { backoff }))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// 应用名，作为订阅名前缀
    pub application_name: String,
    pub topic_namespace: String,
    pub batch_size: usize,
    pub max_batch_wait_ms: u64,
    pub lock_lease_ms: u64,
    pub lock_wait_timeout_ms: u64,
    /// 乐观冲突的最大重试次数，超出后按基础设施故障上报
    pub max_conflict_retries: usize,
    /// 单批内并发处理的 key 数
    pub key_concurrency: usize,
    pub subscription_type: SubscriptionType,
    pub start_position: StartPosition,
    pub redeliver_failed_messages: bool,
    pub guarantee_order_on_failure: bool,
    pub backoff: BackoffConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            application_name: "horizon".to_string(),
            topic_namespace: DEFAULT_NAMESPACE.to_string(),
            batch_size: 1000,
            max_batch_wait_ms: 10,
            lock_lease_ms: 30_000,
            lock_wait_timeout_ms: 10_000,
            max_conflict_retries: 5,
            key_concurrency: 16,
            subscription_type: SubscriptionType::KeyShared,
            start_position: StartPosition::Beginning,
            redeliver_failed_messages: true,
            guarantee_order_on_failure: false,
            backoff: BackoffConfig::default(),
        }
    }
}

impl ProcessingConfig {
    /// 从可选的 YAML 文件与环境变量加载，并校验
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Yaml).required(true));
        }

        let config: ProcessingConfig = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.application_name.trim().is_empty() {
            return Err(AppError::InvalidConfig(
                "application_name must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.key_concurrency == 0 {
            return Err(AppError::InvalidConfig(
                "key_concurrency must be positive".to_string(),
            ));
        }
        if !self.redeliver_failed_messages && self.guarantee_order_on_failure {
            return Err(AppError::InvalidConfig(
                "guarantee_order_on_failure requires redeliver_failed_messages".to_string(),
            ));
        }
        if !self.redeliver_failed_messages && self.backoff != BackoffConfig::None {
            return Err(AppError::InvalidConfig(
                "backoff requires redeliver_failed_messages".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_batch_wait(&self) -> Duration {
        Duration::from_millis(self.max_batch_wait_ms)
    }

    pub fn lock_lease(&self) -> Duration {
        Duration::from_millis(self.lock_lease_ms)
    }

    pub fn lock_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_wait_timeout_ms)
    }

    pub fn resolver(&self) -> TopicResolver {
        TopicResolver::new(self.topic_namespace.clone())
    }

    /// 将订阅相关设置写入构建器
    pub fn configure(&self, builder: SubscriptionBuilder) -> SubscriptionBuilder {
        builder
            .subscription_type(self.subscription_type)
            .batch_size(self.batch_size)
            .max_batch_wait(self.max_batch_wait())
            .start_position(self.start_position)
            .redeliver_failed_messages(self.redeliver_failed_messages)
            .guarantee_message_order_on_failure(self.guarantee_order_on_failure)
            .backoff_strategy(self.backoff.strategy())
    }
}
