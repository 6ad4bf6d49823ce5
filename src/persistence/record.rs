use crate::error::{IdempotencyError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Status of an idempotency record.
///
/// Only `InProgress` and `Completed` are ever persisted; `Expired` is a
/// virtual status computed from `expiry_timestamp` at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    InProgress,
    Completed,
    Expired,
}

/// The unit of persisted idempotency state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRecord {
    /// `<function_name>[.<qualifier>]#<digest>`; unique across functions
    /// sharing a store, stable across repeated identical requests.
    pub idempotency_key: String,
    pub status: RecordStatus,
    /// Epoch seconds; `now + ttl` at write time.
    pub expiry_timestamp: i64,
    /// Serialized handler result; `None` while in progress.
    pub response_data: Option<String>,
    /// Digest of the validation payload subset; empty when validation is
    /// disabled.
    pub payload_hash: String,
}

impl DataRecord {
    /// A fresh record claiming the key for an execution about to run.
    pub fn in_progress(
        idempotency_key: String,
        expiry_timestamp: i64,
        payload_hash: String,
    ) -> Self {
        Self {
            idempotency_key,
            status: RecordStatus::InProgress,
            expiry_timestamp,
            response_data: None,
            payload_hash,
        }
    }

    /// A record carrying the serialized result of a finished execution.
    pub fn completed(
        idempotency_key: String,
        expiry_timestamp: i64,
        response_data: String,
        payload_hash: String,
    ) -> Self {
        Self {
            idempotency_key,
            status: RecordStatus::Completed,
            expiry_timestamp,
            response_data: Some(response_data),
            payload_hash,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.expiry_timestamp
    }

    /// Stored status, or `Expired` once the expiry timestamp has passed.
    pub fn status_at(&self, now: DateTime<Utc>) -> RecordStatus {
        if self.is_expired_at(now) {
            RecordStatus::Expired
        } else {
            self.status
        }
    }

    /// Restores the typed handler result from `response_data`.
    pub fn response<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.response_data {
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|source| IdempotencyError::Serialization { source }),
            None => Ok(None),
        }
    }
}
