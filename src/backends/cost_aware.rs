//! Cost-Aware Store - In-Memory Entry Store Backend
//!
//! A concurrent key/value store with a global cost budget. Every entry carries
//! a caller-assigned cost and its own TTL. When an insert would exceed the
//! budget, the store sweeps for victims: expired entries go first, then live
//! entries in ascending retention score, where
//!
//! ```text
//! score = cost * (1 + hits) / (1 + idle_secs)
//! ```
//!
//! A higher caller-assigned cost therefore means an entry is more valuable, not
//! merely bigger. An insert is refused when making room would require evicting
//! an entry that scores higher than the newcomer, or when its cost alone
//! exceeds the budget.
//!
//! A sweep does not stop at the bytes the current insert needs: it keeps
//! evicting (still only entries scoring at or below the newcomer) until usage
//! drops to the low watermark, so the inserts that follow take the lock-free
//! path again.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::traits::{CacheBackend, StoreStats};

/// Default global cost budget (256 MiB)
pub const DEFAULT_MAX_COST: i64 = 256 << 20;

/// Usage a sweep aims for, in percent of the budget
const LOW_WATERMARK_PERCENT: i64 = 90;

/// Stored entry with expiry and access tracking
#[derive(Debug)]
struct StoredEntry {
    value: String,
    cost: i64,
    /// `None` when the TTL does not fit in an `Instant`
    expires_at: Option<Instant>,
    hits: AtomicU64,
    /// Nanoseconds since the store epoch
    last_access: AtomicU64,
}

impl StoredEntry {
    fn new(value: String, cost: i64, ttl: Duration, now: Instant, tick: u64) -> Self {
        Self {
            value,
            cost,
            expires_at: now.checked_add(ttl),
            hits: AtomicU64::new(0),
            last_access: AtomicU64::new(tick),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    fn touch(&self, tick: u64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.last_access.store(tick, Ordering::Relaxed);
    }

    #[allow(clippy::cast_precision_loss)]
    fn retention_score(&self, tick: u64) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let idle_nanos = tick.saturating_sub(self.last_access.load(Ordering::Relaxed));
        let idle_secs = idle_nanos as f64 / 1e9;
        retention_score(self.cost, hits, idle_secs)
    }
}

const fn low_watermark(max_cost: i64) -> i64 {
    max_cost / 100 * LOW_WATERMARK_PERCENT + max_cost % 100 * LOW_WATERMARK_PERCENT / 100
}

#[allow(clippy::cast_precision_loss)]
fn retention_score(cost: i64, hits: u64, idle_secs: f64) -> f64 {
    cost as f64 * (1.0 + hits as f64) / (1.0 + idle_secs)
}

/// Eviction candidate collected during a sweep
struct Candidate {
    key: String,
    score: f64,
    cost: i64,
}

/// Process-wide cost-bounded entry store
///
/// **Concurrency**:
/// - Entries live in a `DashMap`; reads only take the shard lock of their own key
/// - The budget is tracked with an atomic counter; inserts that fit reserve
///   their cost without locking
/// - Inserts that do not fit try an admission lock; the holder sweeps down to
///   the low watermark. A writer that finds the lock taken never waits: it
///   retries the lock-free path once and is refused if there is still no room
///
/// **Example**:
/// ```rust
/// use hr_cache::backends::CostAwareStore;
/// use hr_cache::CacheBackend;
/// use std::time::Duration;
///
/// let store = CostAwareStore::new(1024);
/// assert!(store.set_with_cost("user:1", "{}".to_string(), 8, Duration::from_secs(60)));
/// assert_eq!(store.get("user:1").as_deref(), Some("{}"));
/// ```
pub struct CostAwareStore {
    entries: DashMap<String, StoredEntry>,
    max_cost: i64,
    low_watermark: i64,
    used_cost: AtomicI64,
    /// Serializes over-budget admissions
    admission: Mutex<()>,
    epoch: Instant,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    rejected: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CostAwareStore {
    /// Create a store with the given cost budget
    #[must_use]
    pub fn new(max_cost: i64) -> Self {
        let max_cost = max_cost.max(0);
        info!(max_cost, "Initializing cost-aware entry store");

        Self {
            entries: DashMap::new(),
            max_cost,
            low_watermark: low_watermark(max_cost),
            used_cost: AtomicI64::new(0),
            admission: Mutex::new(()),
            epoch: Instant::now(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Number of stored entries, including expired ones not yet purged
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the costs of all stored entries
    #[must_use]
    pub fn used_cost(&self) -> i64 {
        self.used_cost.load(Ordering::Acquire)
    }

    #[must_use]
    pub const fn max_cost(&self) -> i64 {
        self.max_cost
    }

    /// Remove every expired entry, returning how many were purged
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        let purged = expired
            .iter()
            .filter(|key| self.remove_expired(key, now).is_some())
            .count();
        if purged > 0 {
            debug!(count = purged, "[CostAware] Purged expired entries");
        }
        purged
    }

    #[allow(clippy::cast_possible_truncation)]
    fn tick(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_nanos() as u64
    }

    fn remove_expired(&self, key: &str, now: Instant) -> Option<i64> {
        let (_, entry) = self.entries.remove_if(key, |_, entry| entry.is_expired(now))?;
        self.used_cost.fetch_sub(entry.cost, Ordering::AcqRel);
        self.expirations.fetch_add(1, Ordering::Relaxed);
        Some(entry.cost)
    }

    /// Reserve `cost` against the budget without locking. `released` is the
    /// cost of the entry the write will replace.
    fn try_reserve(&self, cost: i64, released: i64) -> bool {
        let after = self.used_cost.fetch_add(cost, Ordering::AcqRel) + cost;
        if after - released <= self.max_cost {
            true
        } else {
            self.used_cost.fetch_sub(cost, Ordering::AcqRel);
            false
        }
    }

    /// Free at least `need` cost units and up to `target`, never evicting an
    /// entry that scores above `incoming_score`. `exclude` is the key being
    /// written. Nothing live is evicted unless `need` can be met.
    fn make_room(
        &self,
        need: i64,
        target: i64,
        incoming_score: f64,
        exclude: &str,
        now: Instant,
    ) -> bool {
        let tick = self.tick(now);
        let mut expired = Vec::new();
        let mut candidates = Vec::new();

        for entry in &self.entries {
            if entry.key() == exclude {
                continue;
            }
            if entry.is_expired(now) {
                expired.push(entry.key().clone());
            } else {
                candidates.push(Candidate {
                    key: entry.key().clone(),
                    score: entry.retention_score(tick),
                    cost: entry.cost,
                });
            }
        }

        let mut freed: i64 = expired
            .iter()
            .filter_map(|key| self.remove_expired(key, now))
            .sum();
        if freed >= target {
            return true;
        }

        candidates.sort_by(|a, b| a.score.total_cmp(&b.score));

        let mut victims = Vec::new();
        for candidate in candidates {
            if freed >= target {
                break;
            }
            if candidate.score > incoming_score {
                if freed >= need {
                    break;
                }
                debug!(
                    victim = %candidate.key,
                    victim_score = candidate.score,
                    incoming_score,
                    "[CostAware] Remaining entries outrank incoming entry"
                );
                return false;
            }
            freed += candidate.cost;
            victims.push(candidate.key);
        }
        if freed < need {
            return false;
        }

        for key in victims {
            if let Some((_, entry)) = self.entries.remove(&key) {
                self.used_cost.fetch_sub(entry.cost, Ordering::AcqRel);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, cost = entry.cost, "[CostAware] Evicted entry");
            }
        }
        true
    }

    fn reject(&self, key: &str, cost: i64) -> bool {
        // A refused overwrite must not leave the previous value addressable.
        self.remove(key);
        self.rejected.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, cost, "[CostAware] Admission refused");
        false
    }

    fn insert(&self, key: &str, entry: StoredEntry) {
        let cost = entry.cost;
        if let Some(old) = self.entries.insert(key.to_string(), entry) {
            self.used_cost.fetch_sub(old.cost, Ordering::AcqRel);
        }
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, cost, "[CostAware] Stored entry");
    }
}

impl Default for CostAwareStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COST)
    }
}

// ===== Trait Implementations =====

impl CacheBackend for CostAwareStore {
    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.touch(self.tick(now));
                Some(entry.value.clone())
            }
            Some(entry) => {
                drop(entry); // release the shard read lock before removing
                self.remove_expired(key, now);
                None
            }
            None => None,
        };

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    fn set_with_cost(&self, key: &str, value: String, cost: i64, ttl: Duration) -> bool {
        let cost = cost.max(0);
        if ttl.is_zero() || cost > self.max_cost {
            return self.reject(key, cost);
        }

        let now = Instant::now();
        let entry = StoredEntry::new(value, cost, ttl, now, self.tick(now));
        let released = self.entries.get(key).map_or(0, |old| old.cost);

        if self.try_reserve(cost, released) {
            self.insert(key, entry);
            return true;
        }

        let Some(_admission) = self.admission.try_lock() else {
            // Another writer is sweeping; take whatever room it has made so far
            if self.try_reserve(cost, released) {
                self.insert(key, entry);
                return true;
            }
            return self.reject(key, cost);
        };
        let released = self.entries.get(key).map_or(0, |old| old.cost);
        let projected = self.used_cost() + cost - released;
        let need = projected - self.max_cost;
        let target = projected - self.low_watermark;
        let incoming_score = retention_score(cost, 0, 0.0);

        if need > 0 && !self.make_room(need, target, incoming_score, key, now) {
            return self.reject(key, cost);
        }
        if !self.try_reserve(cost, released) {
            return self.reject(key, cost);
        }
        self.insert(key, entry);
        true
    }

    fn remove(&self, key: &str) {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.used_cost.fetch_sub(entry.cost, Ordering::AcqRel);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn stats(&self) -> StoreStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        StoreStats {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.len(),
            used_cost: self.used_cost(),
            max_cost: self.max_cost,
            hit_rate: if total > 0 {
                (hits as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        }
    }

    fn name(&self) -> &'static str {
        "CostAware"
    }
}
