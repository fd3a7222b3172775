//! 领域层统一错误定义
//!
//! 覆盖序列化、传输、存储、锁、配置与聚合器等最小必要集合，
//! 并提供失败分类（`FailureKind`），供处理服务与订阅引擎决定重试策略。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化/解码 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("parse error: {reason}")]
    Parse { reason: String },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 基础设施 ---
    #[error("transport error: {reason}")]
    Transport { reason: String },
    #[error("store error: {reason}")]
    Store { reason: String },
    #[error("version conflict: id={id}, expected={expected}")]
    VersionConflict { id: String, expected: usize },
    #[error("lock timeout: id={id}, waited_ms={waited_ms}")]
    LockTimeout { id: String, waited_ms: u64 },
    #[error("not found: {reason}")]
    NotFound { reason: String },

    // --- 配置 ---
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    // --- 聚合器 ---
    #[error("aggregator error: {reason}")]
    Aggregator { reason: String },
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

/// 失败分类
///
/// 校验失败（`Rejection`）不是错误值，不在此列。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 乐观并发冲突：重新读取后重放，有界重试
    Conflict,
    /// 传输/存储/锁等基础设施故障：按退避策略重投
    Infrastructure,
    /// 配置错误：仅在构建期出现
    Configuration,
    /// 解码失败、消息种类不符、聚合器 panic：该 key 失败且不落库
    Fatal,
}

impl DomainError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            DomainError::VersionConflict { .. } => FailureKind::Conflict,
            DomainError::Transport { .. }
            | DomainError::Store { .. }
            | DomainError::LockTimeout { .. }
            | DomainError::NotFound { .. } => FailureKind::Infrastructure,
            DomainError::InvalidConfig { .. } => FailureKind::Configuration,
            DomainError::Serde { .. }
            | DomainError::Parse { .. }
            | DomainError::TypeMismatch { .. }
            | DomainError::Aggregator { .. } => FailureKind::Fatal,
        }
    }

    /// 冲突与基础设施故障可通过重试恢复
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.failure_kind(),
            FailureKind::Conflict | FailureKind::Infrastructure
        )
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        DomainError::Transport {
            reason: reason.into(),
        }
    }

    pub fn store(reason: impl Into<String>) -> Self {
        DomainError::Store {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        DomainError::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn aggregator(reason: impl Into<String>) -> Self {
        DomainError::Aggregator {
            reason: reason.into(),
        }
    }
}

// ---- Cross-crate conversions for infrastructure convenience ----
// 允许在基础设施层直接使用 `?` 将 sqlx/uuid 等错误转换为 DomainError

#[cfg(feature = "infra-sqlx")]
impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::NotFound {
                reason: "row not found".to_string(),
            },
            other => DomainError::Store {
                reason: other.to_string(),
            },
        }
    }
}

impl From<uuid::Error> for DomainError {
    fn from(err: uuid::Error) -> Self {
        DomainError::Parse {
            reason: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for DomainError {
    fn from(err: chrono::ParseError) -> Self {
        DomainError::Parse {
            reason: err.to_string(),
        }
    }
}
