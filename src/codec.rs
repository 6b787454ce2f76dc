//! JSON payload codec using `serde_json`
//!
//! Entries are stored as strings, so every structured value goes through here
//! on its way into and out of the store.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheError;

/// JSON codec for cache payloads
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Encode `value` into a JSON string destined for `key`
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialization`] if the value cannot be represented
    /// as JSON (for example a map with non-string keys).
    pub fn encode<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<String, CacheError> {
        serde_json::to_string(value).map_err(|source| CacheError::Serialization {
            key: key.to_string(),
            source,
        })
    }

    /// Decode a JSON payload read from `key`
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Deserialization`] if the payload does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self, key: &str, payload: &str) -> Result<T, CacheError> {
        serde_json::from_str(payload).map_err(|source| CacheError::Deserialization {
            key: key.to_string(),
            source,
        })
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        "serde_json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_non_string_map_keys_are_a_serialization_fault() {
        let mut value: BTreeMap<(u8, u8), String> = BTreeMap::new();
        value.insert((1, 2), "x".to_string());

        let err = JsonCodec.encode("k", &value).unwrap_err();
        assert!(matches!(err, CacheError::Serialization { ref key, .. } if key == "k"));
    }

    #[test]
    fn test_shape_mismatch_is_a_deserialization_fault() {
        let err = JsonCodec
            .decode::<HashMap<String, String>>("k", "[1,2,3]")
            .unwrap_err();
        assert!(matches!(err, CacheError::Deserialization { .. }));
    }
}
