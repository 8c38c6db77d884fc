//! leaf value encoding. default is JSON, matching the original store's
//! `serializer` parameter (which defaulted to stdlib `json`).

use serde_json::Value;

use crate::error::Result;

/// encodes/decodes the JSON values stored at leaves.
///
/// `Store` is generic over nothing here — it always speaks `serde_json::Value`
/// internally — but keeping encode/decode behind a trait means the wire
/// format blobs are stored in (currently plain JSON bytes) can change without
/// touching `Store` or `backend::ObjectBackend`.
pub trait Serializer: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

/// default serializer: plain JSON bytes
#[derive(Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_roundtrip() {
        let s = JsonSerializer;
        let value = json!({"a": 1, "b": [1, 2, 3]});
        let bytes = s.encode(&value).unwrap();
        let decoded = s.decode(&bytes).unwrap();
        assert_eq!(value, decoded);
    }
}
