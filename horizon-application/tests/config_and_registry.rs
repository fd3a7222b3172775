use anyhow::Result as AnyResult;
use horizon_application::{
    AppError, BackoffConfig, ProcessingConfig, StateBinding, StateRegistry,
};
use horizon_domain::message::{MessageKind, NoAction, TopicResolver};
use horizon_domain::state::State;
use horizon_domain::streaming::{InMemoryTransport, StartPosition, SubscriptionBuilder, SubscriptionType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ledger;

impl State for Ledger {
    const TYPE: &'static str = "ledger";
    type Command = NoAction;
    type Event = NoAction;
    type Request = NoAction;
    type Response = ();

    fn apply(&mut self, _event: &NoAction) {}
}

fn write_yaml(contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("horizon-{}.yaml", ulid::Ulid::new()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn defaults_are_valid() {
    let config = ProcessingConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.batch_size, 1000);
    assert_eq!(config.max_batch_wait(), Duration::from_millis(10));
    assert_eq!(config.lock_lease(), Duration::from_secs(30));
    assert_eq!(config.lock_wait_timeout(), Duration::from_secs(10));
    assert_eq!(config.subscription_type, SubscriptionType::KeyShared);
    assert_eq!(config.backoff, BackoffConfig::Constant { delay_ms: 10 });
}

#[test]
fn loads_yaml_file() -> AnyResult<()> {
    let path = write_yaml(
        r#"
application_name: ledger-app
topic_namespace: bank
batch_size: 50
max_batch_wait_ms: 5
subscription_type: shared
start_position: latest
guarantee_order_on_failure: true
backoff:
  strategy: exponential
  min_delay_ms: 10
  max_delay_ms: 1000
  factor: 2.0
"#,
    );

    let config = ProcessingConfig::load(path.to_str())?;
    std::fs::remove_file(&path)?;

    assert_eq!(config.application_name, "ledger-app");
    assert_eq!(config.batch_size, 50);
    assert_eq!(config.max_batch_wait(), Duration::from_millis(5));
    assert_eq!(config.subscription_type, SubscriptionType::Shared);
    assert_eq!(config.start_position, StartPosition::Latest);
    assert!(config.guarantee_order_on_failure);
    assert_eq!(
        config.backoff,
        BackoffConfig::Exponential {
            min_delay_ms: 10,
            max_delay_ms: 1000,
            factor: 2.0,
            jitter: false,
        }
    );
    // 未出现的字段保持默认值
    assert_eq!(config.lock_lease_ms, 30_000);
    assert_eq!(
        config.resolver().topic(MessageKind::Event, "ledger", None),
        "bank/event/ledger"
    );

    let backoff = config.backoff.strategy().unwrap();
    assert_eq!(backoff.delay(1), Duration::from_millis(10));
    Ok(())
}

#[test]
fn rejects_inconsistent_file() {
    let path = write_yaml(
        r#"
redeliver_failed_messages: false
guarantee_order_on_failure: true
backoff:
  strategy: none
"#,
    );

    let result = ProcessingConfig::load(path.to_str());
    let _ = std::fs::remove_file(&path);
    assert!(matches!(result, Err(AppError::InvalidConfig(_))));
}

#[test]
fn missing_file_is_an_error() {
    let result = ProcessingConfig::load(Some("/definitely/not/here.yaml"));
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn backoff_requires_redelivery() {
    let config = ProcessingConfig {
        redeliver_failed_messages: false,
        ..ProcessingConfig::default()
    };
    assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));

    let dropping = ProcessingConfig {
        redeliver_failed_messages: false,
        backoff: BackoffConfig::None,
        ..ProcessingConfig::default()
    };
    assert!(dropping.validate().is_ok());
    assert!(dropping.backoff.strategy().is_none());
}

#[test]
fn configure_applies_subscription_settings() -> AnyResult<()> {
    let config = ProcessingConfig {
        batch_size: 7,
        subscription_type: SubscriptionType::Failover,
        guarantee_order_on_failure: true,
        ..ProcessingConfig::default()
    };
    let builder = SubscriptionBuilder::new(Arc::new(InMemoryTransport::new()), config.resolver());
    let subscription = config
        .configure(builder)
        .add_state_stream::<Ledger>(MessageKind::Event, None)
        .subscription_name("ledger-view")
        .build_config()?;

    assert_eq!(subscription.batch_size(), 7);
    assert_eq!(subscription.subscription_type(), SubscriptionType::Failover);
    assert!(subscription.ordering_guaranteed_on_failure());
    assert_eq!(subscription.topics(), &["horizon/event/ledger".to_string()]);
    Ok(())
}

#[test]
fn registry_defaults_and_overrides() -> AnyResult<()> {
    let registry = StateRegistry::new();

    let default = registry.binding::<Ledger>();
    assert_eq!(default.snapshot_database(), "snapshot_ledger");
    assert_eq!(default.view_database(), "view_ledger");
    assert_eq!(default.topic_namespace(), None);

    registry.register::<Ledger>(
        StateBinding::builder()
            .snapshot_database("ledger_main")
            .view_database("ledger_views")
            .topic_namespace("finance")
            .build(),
    )?;
    let custom = registry.binding::<Ledger>();
    assert_eq!(custom.snapshot_database(), "ledger_main");
    let resolver = custom.resolver(&TopicResolver::default());
    assert_eq!(
        resolver.topic(MessageKind::Command, Ledger::TYPE, None),
        "finance/command/ledger"
    );

    let again = registry.register::<Ledger>(StateBinding::defaults(Ledger::TYPE));
    assert!(matches!(
        again,
        Err(AppError::AlreadyRegistered { state_type: "ledger" })
    ));
    Ok(())
}
