use super::record::DataRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Outcomes a concrete store reports back to the engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the key.
    #[error("no record found for idempotency key '{0}'")]
    NotFound(String),

    /// The conditional put refused to overwrite a live record.
    #[error("a live record already exists for idempotency key '{0}'")]
    AlreadyExists(String),

    /// Anything else the backend raised (I/O, throttling, codec).
    #[error("store backend failure")]
    Backend(#[from] anyhow::Error),
}

/// The durable-store contract the engine is written against.
///
/// `put_record` is the linchpin of the at-most-one-execution guarantee: it
/// MUST atomically refuse (`AlreadyExists`) when a non-expired record holds
/// the key, and succeed by overwriting when the existing record has expired
/// relative to `now`. Implementations must not emulate this with separate
/// read-then-write calls.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn get_record(&self, key: &str) -> Result<DataRecord, StoreError>;

    async fn put_record(&self, record: &DataRecord, now: DateTime<Utc>) -> Result<(), StoreError>;

    async fn update_record(&self, record: &DataRecord) -> Result<(), StoreError>;

    async fn delete_record(&self, key: &str) -> Result<(), StoreError>;
}
