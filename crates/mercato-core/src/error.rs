use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MercatoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A feed entry that can never be applied (bad JSON, unknown event type,
    /// invalid address or integer). Rejected, never retried.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl MercatoError {
    /// Whether the error is tied to one feed entry rather than the store.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedEvent(_))
    }
}

pub type Result<T> = std::result::Result<T, MercatoError>;
