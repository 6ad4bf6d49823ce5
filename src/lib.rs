//! An idempotency engine for request-handling functions.
//!
//! Given an inbound event and a handler that produces a result, the engine
//! guarantees that re-invocations carrying the same logical request (same
//! derived key) observe a single execution's outcome instead of re-running
//! side effects. It sits between a caller and its handler, backed by a
//! durable record store (any [`persistence::PersistenceStore`]) and an
//! optional in-process LRU cache.
//!
//! ```no_run
//! use idempotency_engine::{IdempotencyConfig, IdempotencyEngine, InMemoryStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> idempotency_engine::Result<()> {
//! let config = IdempotencyConfig::new()
//!     .with_function_name("orders")
//!     .with_event_key_path("Body.id")
//!     .with_local_cache(255);
//! let engine = IdempotencyEngine::new(Arc::new(InMemoryStore::new()), config);
//!
//! let event = json!({"Body": {"id": "order-1"}});
//! engine.save_in_progress(&event).await?;
//! // ... run the handler ...
//! engine.save_success(&event, &json!({"charged": true})).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod persistence;

pub use cache::{CacheStats, LocalCache};
pub use codec::{JsonCodec, ResponseCodec};
pub use config::{IdempotencyConfig, IdempotencySettings};
pub use engine::IdempotencyEngine;
pub use error::{IdempotencyError, Result};
pub use key::{generate_hash, DerivedKey, DottedPathEvaluator, KeyDeriver, PathEvaluator};
pub use persistence::{DataRecord, InMemoryStore, PersistenceStore, RecordStatus, StoreError};
