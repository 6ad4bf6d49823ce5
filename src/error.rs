use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IdempotencyError>;

/// Errors surfaced by the idempotency engine.
///
/// Every variant carries the idempotency key (and, for store failures, the
/// operation name) so callers can log the failure without re-deriving it.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// No key material was found in the event and the configuration demands
    /// a failure instead of falling back to the full event.
    #[error("no idempotency key material found in event at '{path}'")]
    KeyMissing { path: String },

    /// Another execution already owns this key. Raised from the local-cache
    /// fast path or translated from the store's conditional-write refusal.
    #[error("an execution is already in progress for idempotency key '{key}'")]
    ItemAlreadyExists { key: String },

    /// The record is absent from both cache and store. Seeing this from
    /// `get_record` means no prior `save_in_progress` was issued.
    #[error("no idempotency record found for key '{key}'")]
    ItemNotFound { key: String },

    /// The stored payload hash does not match the current request. The key
    /// is being reused for a semantically different payload.
    #[error("payload does not match the stored record for idempotency key '{key}'")]
    ValidationMismatch { key: String },

    /// A store-level failure (I/O, throttling). Never retried by the engine;
    /// retry policy belongs to the caller.
    #[error("persistence layer failed during {operation} for idempotency key '{key}'")]
    PersistenceLayer {
        key: String,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A handler response or stored record could not be encoded or decoded.
    #[error("failed to serialize or deserialize response data")]
    Serialization {
        #[source]
        source: serde_json::Error,
    },
}

impl IdempotencyError {
    /// The idempotency key associated with this error, when one was derived.
    pub fn idempotency_key(&self) -> Option<&str> {
        match self {
            IdempotencyError::ItemAlreadyExists { key }
            | IdempotencyError::ItemNotFound { key }
            | IdempotencyError::ValidationMismatch { key }
            | IdempotencyError::PersistenceLayer { key, .. } => Some(key),
            IdempotencyError::KeyMissing { .. } | IdempotencyError::Serialization { .. } => None,
        }
    }
}
