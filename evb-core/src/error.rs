//! Error types for the event builder core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvbError>;

#[derive(Error, Debug)]
pub enum EvbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid fragment: {reason}")]
    InvalidFragment { reason: String },

    #[error("Fabric transport error: {message}")]
    Fabric { message: String },

    #[error("Unexpected error: {message}")]
    Unexpected { message: String },
}

impl EvbError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    pub fn invalid_fragment(reason: impl Into<String>) -> Self {
        Self::InvalidFragment { reason: reason.into() }
    }

    pub fn fabric(message: impl Into<String>) -> Self {
        Self::Fabric { message: message.into() }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected { message: message.into() }
    }

    /// Transport-transient failures (per-destination post failure) are logged
    /// and dropped rather than propagated; everything else is startup-fatal.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fabric { .. } | Self::Io(_))
    }
}
