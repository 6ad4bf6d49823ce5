use crate::error::{IdempotencyError, Result};
use serde_json::Value;

/// Encodes handler results for storage in a record's `response_data` and
/// restores them on replay.
pub trait ResponseCodec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<String>;
    fn decode(&self, raw: &str) -> Result<Value>;
}

/// Default codec storing responses as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ResponseCodec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String> {
        serde_json::to_string(value).map_err(|source| IdempotencyError::Serialization { source })
    }

    fn decode(&self, raw: &str) -> Result<Value> {
        serde_json::from_str(raw).map_err(|source| IdempotencyError::Serialization { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_decode_round_trip() {
        let codec = JsonCodec;
        let value = json!({"transaction_id": "tx-1", "amount": 100});

        let raw = codec.encode(&value).expect("encode");
        assert_eq!(codec.decode(&raw).expect("decode"), value);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = JsonCodec.decode("not json").expect_err("must fail");
        assert!(matches!(err, IdempotencyError::Serialization { .. }));
    }
}
