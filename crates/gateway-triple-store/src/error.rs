use std::time::Duration;

use thiserror::Error;

/// Store-facing errors of the gateway core
#[derive(Error, Debug)]
pub enum StoreError {
    /// Operation text matches neither the read nor the update grammar
    #[error("parse error: {reason}")]
    Parse { reason: String },

    /// A result shape the executor does not know how to serve
    #[error("unsupported operation type: {shape}")]
    UnsupportedOperationType { shape: String },

    /// A read exceeded its allotted duration; the transaction was aborted
    #[error("read timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Storage engine failure presumed recoverable (lock contention, transient I/O)
    #[error("transient storage error: {reason}")]
    TransientStorage { reason: String },

    /// Storage engine failure that will not recover on its own
    #[error("storage engine error: {reason}")]
    Engine { reason: String },

    /// Retry bound reached; terminal for that unit of work
    #[error("exhausted {attempts} attempts: {reason}")]
    ExhaustedRetries { attempts: u32, reason: String },

    /// Response rendering failed
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn engine(err: impl std::fmt::Display) -> Self {
        Self::Engine {
            reason: err.to_string(),
        }
    }

    pub(crate) fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }

    /// Whether a retry/redelivery may be attempted for this failure.
    ///
    /// Parse and authorization problems are deterministic, timeouts already
    /// aborted the transaction on the caller's behalf. Engine failures are
    /// presumed recoverable unless proven otherwise, matching the redelivery
    /// policy of the update channel.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientStorage { .. } | Self::Engine { .. } | Self::Io(_)
        )
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;
