use crate::config::ConfigError;
use crate::source::MeasurementError;
use crate::storage::StorageError;

/// Error type for speedwatch operations
///
/// Each boundary owns its own error enum; this type only aggregates them so
/// startup code can use `?` across all of them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Measurement failed: {0}")]
    Measurement(#[from] MeasurementError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid scheduler state: {0}")]
    InvalidState(String),
}

impl Error {
    pub(crate) fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Whether the error should stop the process during startup.
    ///
    /// Measurement failures never are; everything else means the scheduler
    /// cannot run correctly.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Measurement(_))
    }
}

/// Result type for speedwatch operations
pub type Result<T> = std::result::Result<T, Error>;
