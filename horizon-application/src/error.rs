use horizon_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("config: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("state already registered: {state_type}")]
    AlreadyRegistered { state_type: &'static str },

    #[error("store type mismatch: database={database}, expected={expected}")]
    TypeMismatch {
        database: String,
        expected: &'static str,
    },

    #[error("host already started")]
    AlreadyStarted,
}

pub type AppResult<T> = Result<T, AppError>;
