use crate::cache::LocalCache;
use crate::codec::{JsonCodec, ResponseCodec};
use crate::config::IdempotencyConfig;
use crate::error::{IdempotencyError, Result};
use crate::key::{DerivedKey, KeyDeriver, PathEvaluator};
use crate::persistence::{DataRecord, PersistenceStore, RecordStatus, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Orchestrates key derivation, the local-cache fast path and the store
/// protocol for at-most-one recorded completion per key.
///
/// The engine holds no locks of its own: concurrent invocations with the
/// same key, in-process or across machines, race solely through the store's
/// conditional put. The local cache only short-circuits lookups this process
/// has already resolved; it is never authoritative for exclusion.
pub struct IdempotencyEngine {
    store: Arc<dyn PersistenceStore>,
    deriver: KeyDeriver,
    codec: Arc<dyn ResponseCodec>,
    cache: Option<LocalCache>,
    config: IdempotencyConfig,
}

impl IdempotencyEngine {
    pub fn new(store: Arc<dyn PersistenceStore>, config: IdempotencyConfig) -> Self {
        let cache = config
            .use_local_cache
            .then(|| LocalCache::new(config.local_cache_capacity));

        Self {
            store,
            deriver: KeyDeriver::new(config.clone()),
            codec: Arc::new(JsonCodec),
            cache,
            config,
        }
    }

    /// Replaces the default dotted-path evaluator.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn PathEvaluator>) -> Self {
        self.deriver = KeyDeriver::with_evaluator(self.config.clone(), evaluator);
        self
    }

    /// Replaces the default JSON response codec.
    pub fn with_codec(mut self, codec: Arc<dyn ResponseCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Claims the key for an execution about to run.
    ///
    /// Fails with `ItemAlreadyExists` when another execution owns the key,
    /// either from the local cache (without contacting the store) or from
    /// the store's conditional-write refusal.
    pub async fn save_in_progress(&self, event: &Value) -> Result<DataRecord> {
        self.save_in_progress_at(event, Utc::now()).await
    }

    pub async fn save_in_progress_at(
        &self,
        event: &Value,
        now: DateTime<Utc>,
    ) -> Result<DataRecord> {
        let derived = self.deriver.derive(event)?;
        let key = &derived.idempotency_key;

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(key) {
                if cached.is_expired_at(now) {
                    cache.remove(key);
                } else {
                    warn!(idempotency_key = %key, "live record found in local cache");
                    return Err(IdempotencyError::ItemAlreadyExists { key: key.clone() });
                }
            }
        }

        let record = DataRecord::in_progress(
            key.clone(),
            self.config.expiry_after(now),
            derived.payload_hash,
        );

        match self.store.put_record(&record, now).await {
            Ok(()) => {
                debug!(idempotency_key = %key, "stored in-progress record");
                // In-progress state is short-lived and store-authoritative;
                // only completed results go into the cache.
                Ok(record)
            }
            Err(StoreError::AlreadyExists(_)) => {
                warn!(idempotency_key = %key, "conditional write lost the race");
                Err(IdempotencyError::ItemAlreadyExists { key: key.clone() })
            }
            Err(err) => Err(persistence_error(key, "put_record", err)),
        }
    }

    /// Records the serialized handler result against the key.
    pub async fn save_success<R: Serialize>(
        &self,
        event: &Value,
        response: &R,
    ) -> Result<DataRecord> {
        self.save_success_at(event, response, Utc::now()).await
    }

    pub async fn save_success_at<R: Serialize>(
        &self,
        event: &Value,
        response: &R,
        now: DateTime<Utc>,
    ) -> Result<DataRecord> {
        let derived = self.deriver.derive(event)?;
        let key = derived.idempotency_key.clone();

        let value = serde_json::to_value(response)
            .map_err(|source| IdempotencyError::Serialization { source })?;
        let response_data = self.codec.encode(&value)?;

        let record = DataRecord::completed(
            key.clone(),
            self.config.expiry_after(now),
            response_data,
            derived.payload_hash,
        );

        self.store
            .update_record(&record)
            .await
            .map_err(|err| persistence_error(&key, "update_record", err))?;

        if let Some(cache) = &self.cache {
            cache.set(record.clone());
        }

        debug!(idempotency_key = %key, "stored completed record");
        Ok(record)
    }

    /// Retrieves the record owning the key, validating the payload hash
    /// when payload validation is configured.
    pub async fn get_record(&self, event: &Value) -> Result<DataRecord> {
        self.get_record_at(event, Utc::now()).await
    }

    pub async fn get_record_at(&self, event: &Value, now: DateTime<Utc>) -> Result<DataRecord> {
        let derived = self.deriver.derive(event)?;
        let key = &derived.idempotency_key;

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(key) {
                if cached.is_expired_at(now) {
                    debug!(idempotency_key = %key, "removing expired cache entry");
                    cache.remove(key);
                } else {
                    self.validate_payload(&cached, &derived)?;
                    debug!(idempotency_key = %key, "serving record from local cache");
                    return Ok(cached);
                }
            }
        }

        let record = match self.store.get_record(key).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                return Err(IdempotencyError::ItemNotFound { key: key.clone() })
            }
            Err(err) => return Err(persistence_error(key, "get_record", err)),
        };

        self.validate_payload(&record, &derived)?;

        if let Some(cache) = &self.cache {
            // A racing reader must not cache transient in-progress state.
            if record.status == RecordStatus::Completed && !record.is_expired_at(now) {
                cache.set(record.clone());
            }
        }

        Ok(record)
    }

    /// Releases the key after a failed handler so the request can retry.
    ///
    /// Removes both the store record and any cache entry; a record already
    /// absent from the store counts as released.
    pub async fn delete_record(&self, event: &Value) -> Result<()> {
        let derived = self.deriver.derive(event)?;
        let key = derived.idempotency_key;

        match self.store.delete_record(&key).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(persistence_error(&key, "delete_record", err)),
        }

        if let Some(cache) = &self.cache {
            cache.remove(&key);
        }

        debug!(idempotency_key = %key, "deleted idempotency record");
        Ok(())
    }

    fn validate_payload(&self, record: &DataRecord, derived: &DerivedKey) -> Result<()> {
        if self.config.payload_validation_path.is_none() {
            return Ok(());
        }

        if record.payload_hash != derived.payload_hash {
            warn!(
                idempotency_key = %derived.idempotency_key,
                "stored payload hash does not match the current request"
            );
            return Err(IdempotencyError::ValidationMismatch {
                key: derived.idempotency_key.clone(),
            });
        }

        Ok(())
    }
}

fn persistence_error(key: &str, operation: &'static str, err: StoreError) -> IdempotencyError {
    IdempotencyError::PersistenceLayer {
        key: key.to_string(),
        operation,
        source: anyhow::Error::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MockPersistenceStore;
    use serde_json::json;

    fn event() -> Value {
        json!({"Body": {"id": "order-1"}})
    }

    fn config() -> IdempotencyConfig {
        IdempotencyConfig::new()
            .with_function_name("testFunction")
            .with_event_key_path("Body.id")
    }

    fn engine(store: MockPersistenceStore, config: IdempotencyConfig) -> IdempotencyEngine {
        IdempotencyEngine::new(Arc::new(store), config)
    }

    #[tokio::test]
    async fn test_store_refusal_translates_to_already_exists() {
        let mut store = MockPersistenceStore::new();
        store
            .expect_put_record()
            .times(1)
            .returning(|record, _| Err(StoreError::AlreadyExists(record.idempotency_key.clone())));

        let engine = engine(store, config());
        let err = engine
            .save_in_progress(&event())
            .await
            .expect_err("race lost");
        assert!(matches!(err, IdempotencyError::ItemAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_operation_name() {
        let mut store = MockPersistenceStore::new();
        store
            .expect_get_record()
            .times(1)
            .returning(|_| Err(StoreError::Backend(anyhow::anyhow!("throttled"))));

        let engine = engine(store, config());
        let err = engine.get_record(&event()).await.expect_err("backend down");
        match err {
            IdempotencyError::PersistenceLayer { operation, key, .. } => {
                assert_eq!(operation, "get_record");
                assert!(key.starts_with("testFunction#"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cache_fast_path_rejects_without_store_call() {
        let mut store = MockPersistenceStore::new();
        // update_record backs the save_success that seeds the cache; no
        // put_record expectation is registered, so any store contact from
        // the second save_in_progress would panic the mock.
        store.expect_update_record().times(1).returning(|_| Ok(()));

        let engine = engine(store, config().with_local_cache(16));
        engine
            .save_success(&event(), &json!({"ok": true}))
            .await
            .expect("seed cache");

        let err = engine
            .save_in_progress(&event())
            .await
            .expect_err("cache holds a live record");
        assert!(matches!(err, IdempotencyError::ItemAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_expired_cache_entry_is_removed_and_store_consulted() {
        let now = Utc::now();
        let mut store = MockPersistenceStore::new();
        store.expect_update_record().times(1).returning(|_| Ok(()));
        store.expect_put_record().times(1).returning(|_, _| Ok(()));

        // TTL of zero: the cached record expires one second later.
        let config = config()
            .with_local_cache(16)
            .with_ttl(std::time::Duration::from_secs(0));
        let engine = engine(store, config);

        engine
            .save_success_at(&event(), &json!({"ok": true}), now)
            .await
            .expect("seed cache");

        let later = now + chrono::Duration::seconds(5);
        engine
            .save_in_progress_at(&event(), later)
            .await
            .expect("expired cache entry must not block a new execution");
    }

    #[tokio::test]
    async fn test_get_record_does_not_cache_in_progress_records() {
        let mut store = MockPersistenceStore::new();
        let expiry = Utc::now().timestamp() + 60;
        // Two lookups must both reach the store: in-progress records are
        // never served from the cache.
        store.expect_get_record().times(2).returning(move |key| {
            Ok(DataRecord::in_progress(
                key.to_string(),
                expiry,
                String::new(),
            ))
        });

        let engine = engine(store, config().with_local_cache(16));
        for _ in 0..2 {
            let record = engine.get_record(&event()).await.expect("record exists");
            assert_eq!(record.status, RecordStatus::InProgress);
        }
    }

    #[tokio::test]
    async fn test_get_record_caches_completed_records() {
        let mut store = MockPersistenceStore::new();
        let expiry = Utc::now().timestamp() + 60;
        store.expect_get_record().times(1).returning(move |key| {
            Ok(DataRecord::completed(
                key.to_string(),
                expiry,
                "{}".to_string(),
                String::new(),
            ))
        });

        let engine = engine(store, config().with_local_cache(16));
        engine.get_record(&event()).await.expect("first, from store");
        let record = engine.get_record(&event()).await.expect("second, cached");
        assert_eq!(record.status, RecordStatus::Completed);
    }

    #[tokio::test]
    async fn test_missing_record_is_item_not_found() {
        let mut store = MockPersistenceStore::new();
        store
            .expect_get_record()
            .times(1)
            .returning(|key| Err(StoreError::NotFound(key.to_string())));

        let engine = engine(store, config());
        let err = engine.get_record(&event()).await.expect_err("absent");
        assert!(matches!(err, IdempotencyError::ItemNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_record() {
        let mut store = MockPersistenceStore::new();
        store
            .expect_delete_record()
            .times(1)
            .returning(|key| Err(StoreError::NotFound(key.to_string())));

        let engine = engine(store, config());
        engine
            .delete_record(&event())
            .await
            .expect("absent record counts as released");
    }

    #[tokio::test]
    async fn test_save_in_progress_writes_ttl_expiry() {
        let now = Utc::now();
        let mut store = MockPersistenceStore::new();
        let expected_expiry = now.timestamp() + 120;
        store
            .expect_put_record()
            .times(1)
            .withf(move |record, _| {
                record.status == RecordStatus::InProgress
                    && record.expiry_timestamp == expected_expiry
                    && record.response_data.is_none()
            })
            .returning(|_, _| Ok(()));

        let config = config().with_ttl(std::time::Duration::from_secs(120));
        let engine = engine(store, config);
        engine
            .save_in_progress_at(&event(), now)
            .await
            .expect("claim succeeds");
    }
}
