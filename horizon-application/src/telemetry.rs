//! 日志初始化
//!
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 日志级别环境变量
pub const LOG_ENV_VAR: &str = "HORIZON_LOG";

/// 安装 fmt 日志层，过滤规则读取 `HORIZON_LOG`，缺省为 `info`
///
/// 重复调用时保留首次安装的订阅者。
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
