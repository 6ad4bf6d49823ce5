use super::path::{DottedPathEvaluator, PathEvaluator};
use crate::config::IdempotencyConfig;
use crate::error::{IdempotencyError, Result};
use md5::{Digest, Md5};
use serde_json::Value;
use std::sync::Arc;

/// Key plus validation hash derived from a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    pub idempotency_key: String,
    /// Empty string when payload validation is disabled.
    pub payload_hash: String,
}

/// Derives stable idempotency keys from inbound events.
///
/// Pure with respect to (event, configuration): the same event always yields
/// the same key and hash.
pub struct KeyDeriver {
    config: IdempotencyConfig,
    evaluator: Arc<dyn PathEvaluator>,
}

impl KeyDeriver {
    pub fn new(config: IdempotencyConfig) -> Self {
        Self::with_evaluator(config, Arc::new(DottedPathEvaluator))
    }

    pub fn with_evaluator(config: IdempotencyConfig, evaluator: Arc<dyn PathEvaluator>) -> Self {
        Self { config, evaluator }
    }

    pub fn derive(&self, event: &Value) -> Result<DerivedKey> {
        let material = self.key_material(event)?;
        let digest = generate_hash(&material);

        let idempotency_key = match &self.config.function_name_qualifier {
            Some(qualifier) => {
                format!("{}.{}#{}", self.config.function_name, qualifier, digest)
            }
            None => format!("{}#{}", self.config.function_name, digest),
        };

        let payload_hash = match &self.config.payload_validation_path {
            Some(path) => self
                .evaluator
                .evaluate(path, event)
                .map(|subset| generate_hash(&subset))
                .unwrap_or_default(),
            None => String::new(),
        };

        Ok(DerivedKey {
            idempotency_key,
            payload_hash,
        })
    }

    fn key_material(&self, event: &Value) -> Result<Value> {
        let Some(path) = &self.config.event_key_path else {
            return Ok(event.clone());
        };

        match self.evaluator.evaluate(path, event) {
            Some(value) if !is_empty_material(&value) => Ok(value),
            _ if self.config.throw_on_no_idempotency_key => Err(IdempotencyError::KeyMissing {
                path: path.clone(),
            }),
            _ => {
                tracing::warn!(
                    path = %path,
                    "no idempotency key material found, falling back to the full event"
                );
                Ok(event.clone())
            }
        }
    }
}

/// Material that cannot distinguish one request from another.
fn is_empty_material(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

/// Deterministic digest over key material or a validation subset.
///
/// Canonical encoding: strings hash as their raw text, numbers as their
/// decimal rendering, everything else as compact JSON with sorted object
/// keys. The number `256.42` and the string `"256.42"` therefore hash
/// identically.
pub fn generate_hash(value: &Value) -> String {
    let canonical = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    };

    hex::encode(Md5::digest(canonical.as_bytes()))
}
