//! Error types for callback orchestration

use crate::store::StoreError;

/// Result type alias for callback operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while setting up or running callbacks.
///
/// Setup problems surface as [`Error::ConfigError`] before training starts.
/// Anything raised from inside a hook aborts the run; the manager does not
/// isolate one callback's failure from the others.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid callback configuration or registration order.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A lifecycle event arrived before `on_train_begin`.
    #[error("Training has not begun: on_train_begin must be called first")]
    NotStarted,

    /// Failure reported by the model collaborator.
    #[error("Model error: {0}")]
    Model(String),

    /// Metrics store error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Check if this error was raised during setup.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }
}
