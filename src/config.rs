use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Immutable engine configuration, resolved once per engine instance.
///
/// Multiple engines (e.g. one per handler function) each hold their own
/// configuration; nothing here is shared or mutable after construction.
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    /// How long a record shields its key from re-execution.
    pub ttl: Duration,
    /// Path expression selecting the key material from the event.
    /// `None` hashes the entire event.
    pub event_key_path: Option<String>,
    /// Path expression selecting the payload subset to validate against the
    /// stored record. `None` disables payload validation.
    pub payload_validation_path: Option<String>,
    /// Whether completed records are served from the in-process cache.
    pub use_local_cache: bool,
    /// Capacity of the local cache when enabled.
    pub local_cache_capacity: usize,
    /// Fail instead of falling back to the full event when the key path
    /// yields no material.
    pub throw_on_no_idempotency_key: bool,
    /// Namespace prefix so multiple functions can share one store.
    pub function_name: String,
    /// Optional qualifier appended to the function name.
    pub function_name_qualifier: Option<String>,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            event_key_path: None,
            payload_validation_path: None,
            use_local_cache: false,
            local_cache_capacity: 255,
            throw_on_no_idempotency_key: false,
            function_name: String::new(),
            function_name_qualifier: None,
        }
    }
}

impl IdempotencyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_event_key_path(mut self, path: impl Into<String>) -> Self {
        self.event_key_path = Some(path.into());
        self
    }

    pub fn with_payload_validation_path(mut self, path: impl Into<String>) -> Self {
        self.payload_validation_path = Some(path.into());
        self
    }

    /// Enables the local cache with the given capacity.
    pub fn with_local_cache(mut self, capacity: usize) -> Self {
        self.use_local_cache = true;
        self.local_cache_capacity = capacity;
        self
    }

    pub fn with_throw_on_no_idempotency_key(mut self) -> Self {
        self.throw_on_no_idempotency_key = true;
        self
    }

    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = name.into();
        self
    }

    pub fn with_function_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.function_name_qualifier = Some(qualifier.into());
        self
    }

    /// Expiry timestamp (epoch seconds) for a record written at `now`.
    pub fn expiry_after(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp() + self.ttl.as_secs() as i64
    }
}

/// File/environment-backed settings for deployments that configure the
/// engine externally rather than in code.
///
/// Reads `config/idempotency.*` when present, then `IDEMPOTENCY__*`
/// environment variables (e.g. `IDEMPOTENCY__TTL_SECONDS=7200`).
#[derive(Debug, Deserialize)]
pub struct IdempotencySettings {
    pub ttl_seconds: u64,
    pub event_key_path: Option<String>,
    pub payload_validation_path: Option<String>,
    pub use_local_cache: bool,
    pub local_cache_capacity: usize,
    pub throw_on_no_idempotency_key: bool,
    pub function_name: Option<String>,
    pub function_name_qualifier: Option<String>,
}

impl IdempotencySettings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("ttl_seconds", 3600)?
            .set_default("use_local_cache", false)?
            .set_default("local_cache_capacity", 255)?
            .set_default("throw_on_no_idempotency_key", false)?
            .add_source(config::File::with_name("config/idempotency").required(false))
            .add_source(config::Environment::with_prefix("IDEMPOTENCY").separator("__"));

        builder.build()?.try_deserialize()
    }
}

impl From<IdempotencySettings> for IdempotencyConfig {
    fn from(settings: IdempotencySettings) -> Self {
        Self {
            ttl: Duration::from_secs(settings.ttl_seconds),
            event_key_path: settings.event_key_path,
            payload_validation_path: settings.payload_validation_path,
            use_local_cache: settings.use_local_cache,
            local_cache_capacity: settings.local_cache_capacity,
            throw_on_no_idempotency_key: settings.throw_on_no_idempotency_key,
            function_name: settings.function_name.unwrap_or_default(),
            function_name_qualifier: settings.function_name_qualifier,
        }
    }
}
