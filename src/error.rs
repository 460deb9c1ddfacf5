use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GracefulError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid option: {message}")]
    InvalidOption { message: String },

    #[error("Unknown signal: {0}")]
    UnknownSignal(String),

    #[error("startup timed out after {0:?}")]
    StartupTimeout(Duration),

    #[error("shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("context canceled")]
    Cancelled,

    #[error("step '{step}' panicked: {message}")]
    StepPanicked { step: String, message: String },

    #[error("orchestrator has already been started")]
    AlreadyStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("System error: {message}")]
    System { message: String },
}

impl GracefulError {
    pub fn invalid_option<S: Into<String>>(message: S) -> Self {
        Self::InvalidOption {
            message: message.into(),
        }
    }

    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// True for every error that was produced by a deadline running out
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::StartupTimeout(_) | Self::ShutdownTimeout(_) | Self::DeadlineExceeded
        )
    }
}

pub type Result<T> = std::result::Result<T, GracefulError>;
