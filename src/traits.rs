//! Cache Backend Trait
//!
//! The entry store sits behind [`CacheBackend`] so that services, the ledger
//! and the cache manager never depend on a concrete store. The default
//! implementation is [`CostAwareStore`](crate::backends::CostAwareStore).
//!
//! # Example: Custom Backend
//!
//! ```rust,ignore
//! use hr_cache::{CacheBackend, StoreStats};
//! use std::time::Duration;
//!
//! struct MyStore { /* ... */ }
//!
//! impl CacheBackend for MyStore {
//!     fn get(&self, key: &str) -> Option<String> { /* ... */ }
//!     fn set_with_cost(&self, key: &str, value: String, cost: i64, ttl: Duration) -> bool { /* ... */ }
//!     fn remove(&self, key: &str) { /* ... */ }
//! }
//! ```

use std::time::Duration;

/// Core entry store operations
///
/// Stores are in-process and perform no I/O, so the operations are
/// synchronous. Implementations must be `Send + Sync`: one instance is shared
/// by every in-flight request.
///
/// Values cross the boundary as owned `String`s. Callers never hold a
/// reference into store memory.
pub trait CacheBackend: Send + Sync {
    /// Get a live entry
    ///
    /// # Returns
    ///
    /// * `Some(value)` - Entry present and not expired
    /// * `None` - Key absent, expired, or evicted
    fn get(&self, key: &str) -> Option<String>;

    /// Insert or overwrite an entry
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    /// * `value` - Opaque payload
    /// * `cost` - Caller-assigned cost; higher cost means more valuable
    /// * `ttl` - Time-to-live
    ///
    /// # Returns
    ///
    /// `true` if the entry was admitted. Refusal is a capacity decision, not a
    /// failure: the caller recomputes from the source of truth on the next miss.
    fn set_with_cost(&self, key: &str, value: String, cost: i64, ttl: Duration) -> bool;

    /// Remove an entry. Absent keys are a no-op.
    fn remove(&self, key: &str);

    /// Round-trip a probe entry
    fn health_check(&self) -> bool {
        let probe_key = "__health_check__";
        let probe_value = "ok";

        if !self.set_with_cost(probe_key, probe_value.to_string(), 1, Duration::from_secs(60)) {
            return false;
        }
        let healthy = self.get(probe_key).as_deref() == Some(probe_value);
        self.remove(probe_key);
        healthy
    }

    /// Counters snapshot
    fn stats(&self) -> StoreStats {
        StoreStats::default()
    }

    /// Name used in logs
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Entry store statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    /// Entries refused admission under cost pressure
    pub rejected: u64,
    pub evictions: u64,
    /// Expired entries purged (lazily on read or during eviction sweeps)
    pub expirations: u64,
    pub entries: usize,
    pub used_cost: i64,
    pub max_cost: i64,
    /// Hit rate in percent
    pub hit_rate: f64,
}
