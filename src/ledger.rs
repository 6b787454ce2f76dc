//! Invalidated-ids ledger
//!
//! A bounded FIFO of profile ids mutated since the last batch fetch. It is
//! persisted as one comma-joined entry in the shared store, so it follows the
//! store's lifecycle: empty after a restart, and it may be evicted like any
//! other entry (losing it only costs batching, never correctness).
//!
//! Once the ledger holds `capacity` ids, further pushes are dropped. Old ids
//! are never evicted to make room.
//!
//! Every push is stamped with a sequence number under the ledger lock. A
//! fetch takes a [`Checkpoint`] before it reads the repository and, once it
//! has cached what it read, asks which ids were pushed after that checkpoint.
//! Those pushes are remembered for as long as any checkpoint older than them
//! is alive, including pushes a full ledger refused and pushes another batch
//! has already consumed.
//!
//! ```text
//! push(a)#1 ──┬───────────── push(a)#2 ─────────────┐
//! checkpoint ≤1 ── fetch (old a) ── cache a ── commit: #2 > 1 → drop user:a
//! ```

use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache_keys::INVALIDATED_USER_IDS;
use crate::traits::CacheBackend;

const SEPARATOR: char = ',';

#[derive(Default)]
struct LedgerState {
    /// Last sequence number handed out
    last_seq: u64,
    /// Sequence numbers of the persisted ids, same order
    seqs: VecDeque<u64>,
    /// `upto` of every live checkpoint, with a count
    checkpoints: BTreeMap<u64, usize>,
    /// Pushes newer than the oldest live checkpoint
    recent: VecDeque<(u64, String)>,
}

impl LedgerState {
    fn next_seq(&mut self) -> u64 {
        self.last_seq += 1;
        self.last_seq
    }

    fn release(&mut self, upto: u64) {
        if let Some(count) = self.checkpoints.get_mut(&upto) {
            *count -= 1;
            if *count == 0 {
                self.checkpoints.remove(&upto);
            }
        }
        match self.checkpoints.keys().next() {
            None => self.recent.clear(),
            Some(&oldest) => {
                while self.recent.front().is_some_and(|(seq, _)| *seq <= oldest) {
                    self.recent.pop_front();
                }
            }
        }
    }

    fn pushed_after(&self, upto: u64) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for (_, id) in self.recent.iter().filter(|(seq, _)| *seq > upto) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// Ledger position taken before a fetch
///
/// Holds the ids the ledger contained at that moment. While it is alive the
/// ledger remembers every later push; dropping it releases them.
pub struct Checkpoint {
    ids: Vec<String>,
    upto: u64,
    state: Arc<Mutex<LedgerState>>,
}

impl Checkpoint {
    /// Ids in the ledger when the checkpoint was taken, oldest first
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

impl Drop for Checkpoint {
    fn drop(&mut self) {
        self.state.lock().release(self.upto);
    }
}

pub struct InvalidationLedger {
    store: Arc<dyn CacheBackend>,
    capacity: usize,
    ttl: Duration,
    state: Arc<Mutex<LedgerState>>,
}

impl InvalidationLedger {
    #[must_use]
    pub fn new(store: Arc<dyn CacheBackend>, capacity: usize, ttl: Duration) -> Self {
        Self {
            store,
            capacity,
            ttl,
            state: Arc::new(Mutex::new(LedgerState::default())),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an id
    ///
    /// Returns `false` without touching the ledger when it is full, when the
    /// id is empty or contains the separator, or when the store refuses the
    /// write. A refused push is still visible to live checkpoints.
    pub fn push(&self, id: &str) -> bool {
        if id.is_empty() || id.contains(SEPARATOR) {
            warn!(id = %id, "Refusing malformed id for invalidation ledger");
            return false;
        }

        let mut state = self.state.lock();
        let seq = state.next_seq();
        if !state.checkpoints.is_empty() {
            state.recent.push_back((seq, id.to_string()));
        }

        let mut ids = self.read(&mut state);
        if ids.len() >= self.capacity {
            debug!(id = %id, capacity = self.capacity, "Invalidation ledger full, dropping id");
            return false;
        }
        ids.push(id.to_string());
        if self.write(&ids) {
            state.seqs.push_back(seq);
            true
        } else {
            // A refused write removes the entry
            state.seqs.clear();
            false
        }
    }

    /// Current ids, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        let mut state = self.state.lock();
        self.read(&mut state)
    }

    /// Record the current position before reading the repository
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        let mut state = self.state.lock();
        let ids = self.read(&mut state);
        let upto = state.last_seq;
        *state.checkpoints.entry(upto).or_insert(0) += 1;
        Checkpoint {
            ids,
            upto,
            state: Arc::clone(&self.state),
        }
    }

    /// Ids pushed after `checkpoint` was taken, oldest first, without
    /// duplicates
    #[must_use]
    pub fn pushed_since(&self, checkpoint: &Checkpoint) -> Vec<String> {
        self.state.lock().pushed_after(checkpoint.upto)
    }

    /// Remove the ids a batch fetch consumed
    ///
    /// Only ids pushed at or before `checkpoint` leave the ledger. Returns
    /// every id pushed after it, whether it is still in the ledger, was
    /// refused by a full ledger, or was consumed by a newer batch.
    pub fn commit(&self, checkpoint: &Checkpoint) -> Vec<String> {
        let mut state = self.state.lock();
        let mut ids = self.read(&mut state);

        let consumed = state
            .seqs
            .iter()
            .take_while(|seq| **seq <= checkpoint.upto)
            .count();
        if consumed > 0 {
            ids.drain(..consumed);
            state.seqs.drain(..consumed);
            if ids.is_empty() {
                self.store.remove(INVALIDATED_USER_IDS);
            } else if !self.write(&ids) {
                state.seqs.clear();
            }
        }

        let raced = state.pushed_after(checkpoint.upto);
        debug!(
            consumed,
            remaining = state.seqs.len(),
            raced = raced.len(),
            "Invalidation ledger committed"
        );
        raced
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        self.store.remove(INVALIDATED_USER_IDS);
        state.seqs.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the persisted ids, re-stamping them if the entry changed outside
    /// this ledger (evicted, expired, or written by another instance)
    fn read(&self, state: &mut LedgerState) -> Vec<String> {
        let ids: Vec<String> = self
            .store
            .get(INVALIDATED_USER_IDS)
            .map(|joined| {
                joined
                    .split(SEPARATOR)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if ids.len() != state.seqs.len() {
            debug!(
                persisted = ids.len(),
                tracked = state.seqs.len(),
                "Invalidation ledger changed underneath, re-stamping"
            );
            let restamped = ids.iter().map(|_| state.next_seq()).collect();
            state.seqs = restamped;
        }
        ids
    }

    fn write(&self, ids: &[String]) -> bool {
        let joined = ids.join(",");
        let cost = i64::try_from(INVALIDATED_USER_IDS.len() + joined.len()).unwrap_or(i64::MAX);
        self.store
            .set_with_cost(INVALIDATED_USER_IDS, joined, cost, self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::CostAwareStore;

    fn ledger(capacity: usize) -> InvalidationLedger {
        InvalidationLedger::new(
            Arc::new(CostAwareStore::new(1 << 20)),
            capacity,
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_push_and_snapshot_keep_order() {
        let ledger = ledger(10);
        assert!(ledger.push("a"));
        assert!(ledger.push("b"));
        assert!(ledger.push("a"));

        assert_eq!(ledger.snapshot(), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_full_ledger_drops_new_ids() {
        let ledger = ledger(2);
        assert!(ledger.push("a"));
        assert!(ledger.push("b"));
        assert!(!ledger.push("c"));

        assert_eq!(ledger.snapshot(), vec!["a", "b"]);
    }

    #[test]
    fn test_malformed_ids_are_refused() {
        let ledger = ledger(10);
        assert!(!ledger.push(""));
        assert!(!ledger.push("a,b"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_commit_keeps_ids_pushed_after_checkpoint() {
        let ledger = ledger(10);
        ledger.push("a");
        ledger.push("b");

        let checkpoint = ledger.checkpoint();
        assert_eq!(checkpoint.ids(), ["a", "b"]);
        ledger.push("c");

        assert_eq!(ledger.commit(&checkpoint), vec!["c"]);
        assert_eq!(ledger.snapshot(), vec!["c"]);
    }

    /// A consumed id pushed again is a new invalidation, not part of the batch
    #[test]
    fn test_repush_of_consumed_id_survives_commit() {
        let ledger = ledger(10);
        ledger.push("a");
        let first = ledger.checkpoint();
        let second = ledger.checkpoint();

        assert!(ledger.commit(&first).is_empty());
        ledger.push("a");

        assert_eq!(ledger.commit(&second), vec!["a"]);
        assert_eq!(ledger.snapshot(), vec!["a"]);
    }

    /// An older checkpoint still sees a push a newer batch already consumed
    #[test]
    fn test_push_consumed_by_newer_batch_is_reported() {
        let ledger = ledger(10);
        ledger.push("a");
        let older = ledger.checkpoint();
        ledger.push("a");
        let newer = ledger.checkpoint();

        assert!(ledger.commit(&newer).is_empty());
        assert!(ledger.is_empty());

        assert_eq!(ledger.commit(&older), vec!["a"]);
    }

    #[test]
    fn test_refused_push_is_reported_to_checkpoints() {
        let ledger = ledger(1);
        ledger.push("a");
        let checkpoint = ledger.checkpoint();

        assert!(!ledger.push("b"));

        assert_eq!(ledger.pushed_since(&checkpoint), vec!["b"]);
        assert_eq!(ledger.snapshot(), vec!["a"]);
    }

    #[test]
    fn test_pushes_are_forgotten_once_checkpoints_drop() {
        let ledger = ledger(10);
        let checkpoint = ledger.checkpoint();
        ledger.push("a");
        assert_eq!(ledger.state.lock().recent.len(), 1);

        drop(checkpoint);
        assert!(ledger.state.lock().recent.is_empty());

        ledger.push("b");
        assert!(ledger.state.lock().recent.is_empty());
    }

    #[test]
    fn test_cleared_ledger_is_restamped() {
        let ledger = ledger(10);
        ledger.push("a");
        let checkpoint = ledger.checkpoint();

        ledger.clear();
        ledger.push("x");
        let raced = ledger.commit(&checkpoint);

        assert_eq!(raced, vec!["x"]);
        assert_eq!(ledger.snapshot(), vec!["x"]);
    }

    #[test]
    fn test_commit_everything_removes_entry() {
        let store: Arc<dyn CacheBackend> = Arc::new(CostAwareStore::new(1 << 20));
        let ledger = InvalidationLedger::new(Arc::clone(&store), 10, Duration::from_secs(60));
        ledger.push("a");

        ledger.commit(&ledger.checkpoint());

        assert!(store.get(INVALIDATED_USER_IDS).is_none());
    }
}
