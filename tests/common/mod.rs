use idempotency_engine::{IdempotencyConfig, IdempotencyEngine, InMemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// An order event with a unique id so tests never share keys.
pub fn order_event() -> Value {
    order_event_with("default payload")
}

/// Same shape as `order_event`, with a caller-chosen payload field and a
/// unique id.
pub fn order_event_with(payload: &str) -> Value {
    json!({
        "Body": {
            "id": format!("order-{}", Uuid::new_v4()),
            "payload": payload,
        }
    })
}

/// A copy of `event` with a different payload but the same id, so it derives
/// the same idempotency key.
pub fn with_payload(event: &Value, payload: &str) -> Value {
    let mut altered = event.clone();
    altered["Body"]["payload"] = json!(payload);
    altered
}

pub fn order_config() -> IdempotencyConfig {
    IdempotencyConfig::new()
        .with_function_name("testFunction")
        .with_event_key_path("Body.id")
}

pub fn engine_with(store: Arc<InMemoryStore>, config: IdempotencyConfig) -> IdempotencyEngine {
    init_tracing();
    IdempotencyEngine::new(store, config)
}
