use super::record::DataRecord;
use super::store::{PersistenceStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Reference store over a process-local map.
///
/// Used by the test suite and local development; the conditional-put check
/// happens under the store lock, matching the atomicity a real backend
/// provides through its conditional-write primitive.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<String, DataRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn get_record(&self, key: &str) -> Result<DataRecord, StoreError> {
        self.records
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put_record(&self, record: &DataRecord, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;

        if let Some(existing) = records.get(&record.idempotency_key) {
            if !existing.is_expired_at(now) {
                return Err(StoreError::AlreadyExists(record.idempotency_key.clone()));
            }
        }

        records.insert(record.idempotency_key.clone(), record.clone());
        Ok(())
    }

    async fn update_record(&self, record: &DataRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .insert(record.idempotency_key.clone(), record.clone());
        Ok(())
    }

    async fn delete_record(&self, key: &str) -> Result<(), StoreError> {
        self.records.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record_expiring_at(key: &str, expiry: i64) -> DataRecord {
        DataRecord::in_progress(key.to_string(), expiry, String::new())
    }

    #[tokio::test]
    async fn test_conditional_put_refuses_live_record() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let record = record_expiring_at("fn#abc", now.timestamp() + 60);

        store.put_record(&record, now).await.expect("first put");

        let err = store
            .put_record(&record, now)
            .await
            .expect_err("second put must be refused");
        assert!(matches!(err, StoreError::AlreadyExists(key) if key == "fn#abc"));
    }

    #[tokio::test]
    async fn test_conditional_put_overwrites_expired_record() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        let stale = record_expiring_at("fn#abc", now.timestamp() - 10);
        store
            .put_record(&stale, now - Duration::seconds(60))
            .await
            .expect("initial put");

        let fresh = record_expiring_at("fn#abc", now.timestamp() + 60);
        store
            .put_record(&fresh, now)
            .await
            .expect("expired record must be overwritable");

        let stored = store.get_record("fn#abc").await.expect("record exists");
        assert_eq!(stored.expiry_timestamp, now.timestamp() + 60);
    }

    #[tokio::test]
    async fn test_get_missing_record_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get_record("fn#missing").await.expect_err("absent");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let record = record_expiring_at("fn#abc", now.timestamp() + 60);

        store.put_record(&record, now).await.expect("put");
        store.delete_record("fn#abc").await.expect("delete");
        store.delete_record("fn#abc").await.expect("repeat delete");

        assert!(store.is_empty().await);
    }
}
