//! 重投退避策略（BackoffStrategy）
//!
//! 纯策略对象：将第 n 次重试映射为等待时长。
//!
use backon::{BackoffBuilder, ExponentialBuilder};
use std::fmt;
use std::time::Duration;

pub trait BackoffStrategy: fmt::Debug + Send + Sync {
    /// 第 `attempt` 次重试前的等待（从 1 开始）
    fn delay(&self, attempt: u32) -> Duration;
}

/// 固定间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBackoff {
    delay: Duration,
}

impl ConstantBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ConstantBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

impl BackoffStrategy for ConstantBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// 指数退避，封顶于 `max_delay`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    builder: ExponentialBuilder,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(min_delay: Duration, max_delay: Duration, factor: f32) -> Self {
        let builder = ExponentialBuilder::default()
            .with_min_delay(min_delay)
            .with_max_delay(max_delay)
            .with_factor(factor)
            .with_max_times(usize::MAX);
        Self { builder, max_delay }
    }

    /// 加入随机抖动，避免多个消费者同时重试
    pub fn with_jitter(mut self) -> Self {
        self.builder = self.builder.with_jitter();
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), Duration::from_secs(30), 2.0)
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let step = attempt.saturating_sub(1) as usize;
        self.builder
            .clone()
            .build()
            .nth(step)
            .unwrap_or(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_ignores_attempt() {
        let b = ConstantBackoff::default();
        assert_eq!(b.delay(1), Duration::from_millis(10));
        assert_eq!(b.delay(50), Duration::from_millis(10));
    }

    #[test]
    fn exponential_grows_and_caps() {
        let b = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(100), 2.0);
        assert_eq!(b.delay(1), Duration::from_millis(10));
        assert_eq!(b.delay(2), Duration::from_millis(20));
        assert_eq!(b.delay(3), Duration::from_millis(40));
        assert_eq!(b.delay(10), Duration::from_millis(100));
    }
}
