//! Error taxonomy shared by the network, the sampling engine and conditional models.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for depnet.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input or metadata: matrix/variable-count mismatch, unknown variable,
    /// malformed variable specification or configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested operation is not available for this model or variable,
    /// e.g. a class density for a continuous dependent variable.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The object is not in a state that allows the call (e.g. sampling before training).
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Failure raised by a conditional model engine, passed through untouched.
    #[error("Conditional model failed: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[cfg(feature = "csv")]
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Wraps a model engine failure message.
    pub fn model<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Model(err.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn illegal_state(msg: impl Into<String>) -> Self {
        Error::IllegalState(msg.into())
    }
}
