//! Cache Manager - Typed Helpers over the Entry Store
//!
//! Wraps a [`CacheBackend`] with the string, map and map-array helpers the
//! services use, and computes entry costs from serialized sizes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::codec::JsonCodec;
use crate::config::{CacheConfig, CacheStrategy};
use crate::error::CacheError;
use crate::traits::{CacheBackend, StoreStats};

/// A flat string record, the unit the map helpers store
pub type Record = HashMap<String, String>;

/// Typed helpers over a shared entry store
pub struct CacheManager {
    store: Arc<dyn CacheBackend>,
    codec: JsonCodec,
    config: CacheConfig,
}

impl CacheManager {
    #[must_use]
    pub fn new(store: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        debug!(backend = store.name(), codec = JsonCodec.name(), "Initializing Cache Manager");
        Self {
            store,
            codec: JsonCodec,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CacheBackend> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[must_use]
    pub const fn ttl_for(&self, strategy: CacheStrategy) -> Duration {
        self.config.ttl_for(strategy)
    }

    #[must_use]
    pub fn get_stats(&self) -> StoreStats {
        self.store.stats()
    }

    // ===== Raw strings =====

    pub fn get(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    /// Store a string with cost `len(key) + len(value)` and the default TTL
    pub fn set(&self, key: &str, value: &str) -> bool {
        self.set_with_cost(key, value, string_cost(key, value))
    }

    /// Store a string with cost `len(key) + len(value)`
    pub fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> bool {
        self.set_with_ttl_and_cost(key, value, string_cost(key, value), ttl)
    }

    /// Store a string with an explicit cost and the default TTL
    pub fn set_with_cost(&self, key: &str, value: &str, cost: i64) -> bool {
        self.set_with_ttl_and_cost(key, value, cost, self.config.default_ttl)
    }

    pub fn set_with_ttl_and_cost(&self, key: &str, value: &str, cost: i64, ttl: Duration) -> bool {
        self.store.set_with_cost(key, value.to_string(), cost, ttl)
    }

    /// Remove an entry; absent keys are a no-op
    pub fn delete(&self, key: &str) {
        self.store.remove(key);
    }

    // ===== Maps =====

    /// Read a record
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Deserialization`] if the stored payload is not a
    /// string map.
    pub fn get_as_map(&self, key: &str) -> Result<Option<Record>, CacheError> {
        self.get_decoded(key)
    }

    /// Store a record with the default TTL
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialization`] if the record cannot be encoded.
    pub fn set_as_map(&self, key: &str, value: &Record) -> Result<bool, CacheError> {
        self.set_as_map_with_ttl(key, value, self.config.default_ttl)
    }

    /// Store a record; cost is `len(key) + len(serialized record)`
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialization`] if the record cannot be encoded.
    pub fn set_as_map_with_ttl(&self, key: &str, value: &Record, ttl: Duration) -> Result<bool, CacheError> {
        let payload = self.encode(key, value)?;
        let cost = string_cost(key, &payload);
        Ok(self.store.set_with_cost(key, payload, cost, ttl))
    }

    // ===== Map arrays =====

    /// Read an ordered list of records
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Deserialization`] if the stored payload is not a
    /// list of string maps.
    pub fn get_as_map_array(&self, key: &str) -> Result<Option<Vec<Record>>, CacheError> {
        self.get_decoded(key)
    }

    /// Store an ordered list of records
    ///
    /// The cost is `len(key)` plus the byte length of every field name and
    /// value, multiplied by `cost_multiplier`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialization`] if the records cannot be encoded.
    pub fn set_as_map_array_with_ttl_and_cost_multiplier(
        &self,
        key: &str,
        value: &[Record],
        cost_multiplier: i64,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let payload = self.encode(key, value)?;
        let cost = records_cost(key, value).saturating_mul(cost_multiplier);
        Ok(self.store.set_with_cost(key, payload, cost, ttl))
    }

    fn encode<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<String, CacheError> {
        self.codec.encode(key, value).inspect_err(|e| {
            error!(key = %key, error = %e, "Refusing to cache unserializable value");
        })
    }

    fn get_decoded<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(payload) = self.store.get(key) else {
            return Ok(None);
        };
        self.codec
            .decode(key, &payload)
            .map(Some)
            .inspect_err(|e| error!(key = %key, error = %e, "Cached payload is corrupt"))
    }
}

/// Run a cache fill on its own task
///
/// The fill completes and populates the cache even if the caller's future is
/// dropped halfway through. Panics inside the fill are resumed on the caller.
///
/// # Errors
///
/// Returns [`CacheError::Task`] if the runtime cancelled the task.
pub async fn populate_detached<T, Fut>(fill: Fut) -> Result<T, CacheError>
where
    T: Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    match tokio::spawn(fill).await {
        Ok(value) => Ok(value),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(CacheError::Task(e.to_string())),
    }
}

fn len_cost(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

fn string_cost(key: &str, value: &str) -> i64 {
    len_cost(key.len()).saturating_add(len_cost(value.len()))
}

fn records_cost(key: &str, records: &[Record]) -> i64 {
    records
        .iter()
        .flat_map(|record| record.iter())
        .fold(len_cost(key.len()), |total, (field, value)| {
            total.saturating_add(string_cost(field, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::CostAwareStore;

    fn manager() -> CacheManager {
        CacheManager::new(Arc::new(CostAwareStore::new(1 << 30)), CacheConfig::default())
    }

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_records_cost_sums_field_bytes() {
        let rows = vec![record(&[("id", "1"), ("name", "Ops")]), record(&[("id", "22")])];
        // key(4) + "id""1"(3) + "name""Ops"(7) + "id""22"(4)
        assert_eq!(records_cost("dept", &rows), 18);
    }

    #[test]
    fn test_map_array_cost_applies_multiplier() {
        let cache = manager();
        let rows = vec![record(&[("id", "1")])];

        cache
            .set_as_map_array_with_ttl_and_cost_multiplier("k", &rows, 4, Duration::from_secs(60))
            .unwrap();

        // (1 + 3) * 4
        assert_eq!(cache.get_stats().used_cost, 16);
    }

    #[test]
    fn test_corrupt_payload_is_reported() {
        let cache = manager();
        cache.set("k", "not json");

        assert!(matches!(cache.get_as_map("k"), Err(CacheError::Deserialization { .. })));
    }

    #[test]
    fn test_missing_key_is_not_an_error() {
        let cache = manager();
        assert!(cache.get_as_map_array("absent").unwrap().is_none());
    }
}
