//! Profile Batch-Coalescing Cache
//!
//! Single-profile reads are served from `user:<id>` entries. On a miss the
//! requested id is fetched together with every id in the
//! [`InvalidationLedger`], so one repository round trip refreshes every profile
//! that was recently mutated. Each returned profile is cached under its own id.
//!
//! ```text
//! get(A) ─┬─ hit ──────────────────────────────→ profile
//!         └─ miss → batch(ledger ++ [A]) → cache each → commit ledger → profile A
//! ```
//!
//! Mutations go through [`ProfileCache::invalidate`], which records the id in
//! the ledger and then deletes the entry. Every fetch, batched or single,
//! takes a ledger [`Checkpoint`] before reading the repository. After caching
//! what it read it drops the entries of every id invalidated since that
//! checkpoint, so a fetch that raced a write never leaves the old value
//! behind. This holds with overlapping fetches and with a full ledger.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

use crate::cache_keys;
use crate::cache_manager::{CacheManager, populate_detached};
use crate::config::CacheStrategy;
use crate::domain::Profile;
use crate::error::{CacheError, ServiceResult};
use crate::ledger::{Checkpoint, InvalidationLedger};
use crate::repository::UserRepository;

#[derive(Clone)]
pub struct ProfileCache {
    manager: Arc<CacheManager>,
    ledger: Arc<InvalidationLedger>,
    users: Arc<dyn UserRepository>,
    batch_enabled: bool,
}

impl ProfileCache {
    #[must_use]
    pub fn new(
        manager: Arc<CacheManager>,
        ledger: Arc<InvalidationLedger>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        let batch_enabled = manager.config().batch_profiles;
        Self {
            manager,
            ledger,
            users,
            batch_enabled,
        }
    }

    /// Override the configured batch mode
    #[must_use]
    pub const fn with_batching(mut self, enabled: bool) -> Self {
        self.batch_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn batch_enabled(&self) -> bool {
        self.batch_enabled
    }

    /// Read a profile from the cache only
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Deserialization`] if the cached payload is corrupt.
    pub fn cached(&self, id: &str) -> Result<Option<Profile>, CacheError> {
        let record = self.manager.get_as_map(&cache_keys::user_profile(id))?;
        Ok(record.map(|record| Profile::from_record(id, &record)))
    }

    /// Read a profile, filling the cache on a miss
    ///
    /// Returns `None` when the repository has no profile for `id`. The fill
    /// runs on its own task and completes even if the caller is dropped.
    ///
    /// # Errors
    ///
    /// Repository failures are returned unchanged; nothing is cached and the
    /// ledger is left as it was.
    pub async fn get(&self, id: &str) -> ServiceResult<Option<Profile>> {
        if let Some(profile) = self.cached(id)? {
            debug!(id = %id, "Profile cache hit");
            return Ok(Some(profile));
        }

        let this = self.clone();
        let id = id.to_string();
        populate_detached(async move {
            if this.batch_enabled {
                this.fetch_batch(&id).await
            } else {
                this.fetch_single(&id).await
            }
        })
        .await?
    }

    /// Drop a profile entry after a mutation
    ///
    /// `stale_email` is the email whose `auth:<email>` entry must go as well
    /// (the old address when it changed, or the address of a deleted user).
    /// Returns whether the id made it into the ledger.
    pub fn invalidate(&self, id: &str, stale_email: Option<&str>) -> bool {
        let recorded = self.ledger.push(id);
        self.manager.delete(&cache_keys::user_profile(id));
        if let Some(email) = stale_email {
            self.manager.delete(&cache_keys::auth_email_to_token(email));
        }
        debug!(id = %id, recorded, "Profile invalidated");
        recorded
    }

    async fn fetch_single(&self, id: &str) -> ServiceResult<Option<Profile>> {
        let checkpoint = self.ledger.checkpoint();
        let profile = self.users.get_profile(id).await.inspect_err(|e| {
            error!(id = %id, error = %e, "Profile fetch failed");
        })?;

        if let Some(profile) = &profile {
            self.store(profile)?;
            let raced = self.ledger.pushed_since(&checkpoint);
            self.drop_raced(&[profile.id.clone()], &raced);
        }
        Ok(profile)
    }

    async fn fetch_batch(&self, id: &str) -> ServiceResult<Option<Profile>> {
        let checkpoint = self.ledger.checkpoint();
        let mut ids = checkpoint.ids().to_vec();
        ids.push(id.to_string());

        let profiles = self.users.get_batch_of_profiles(&ids).await.inspect_err(|e| {
            error!(id = %id, batch = ids.len(), error = %e, "Profile batch fetch failed");
        })?;

        let requested: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut populated = Vec::with_capacity(profiles.len());
        let mut found = None;
        for profile in profiles {
            // Never cache or return an id nobody asked for
            if !requested.contains(profile.id.as_str()) {
                continue;
            }
            self.store(&profile)?;
            populated.push(profile.id.clone());
            if profile.id == id {
                found = Some(profile);
            }
        }

        let raced = self.ledger.commit(&checkpoint);
        self.drop_raced(&populated, &raced);

        debug!(
            id = %id,
            batch = ids.len(),
            populated = populated.len(),
            "Profile batch fetched"
        );
        Ok(found)
    }

    /// Delete entries this fetch populated for ids invalidated meanwhile
    fn drop_raced(&self, populated: &[String], raced: &[String]) {
        let raced: HashSet<&str> = raced.iter().map(String::as_str).collect();
        for stale in populated.iter().filter(|id| raced.contains(id.as_str())) {
            debug!(id = %stale, "Dropping profile invalidated during fetch");
            self.manager.delete(&cache_keys::user_profile(stale));
        }
    }

    fn store(&self, profile: &Profile) -> Result<bool, CacheError> {
        self.manager.set_as_map_with_ttl(
            &cache_keys::user_profile(&profile.id),
            &profile.to_record(),
            self.manager.ttl_for(CacheStrategy::Profile),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::CostAwareStore;
    use crate::config::CacheConfig;
    use crate::domain::{Account, AccountUpdate, Credentials};
    use crate::memory::InMemoryHr;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Profile reads take their data, then wait for the test to release them
    struct GatedUsers {
        inner: Arc<InMemoryHr>,
        gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    }

    impl GatedUsers {
        fn new(inner: Arc<InMemoryHr>) -> Self {
            Self {
                inner,
                gates: Mutex::new(VecDeque::new()),
            }
        }

        /// Gate for the next profile read, in call order
        fn gate(&self) -> oneshot::Sender<()> {
            let (release, gate) = oneshot::channel();
            self.gates.lock().push_back(gate);
            release
        }

        async fn wait(&self) {
            let gate = self.gates.lock().pop_front();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
        }
    }

    #[async_trait]
    impl UserRepository for GatedUsers {
        async fn create(&self, credentials: &Credentials) -> anyhow::Result<Option<Account>> {
            UserRepository::create(self.inner.as_ref(), credentials).await
        }

        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
            self.inner.find_by_email(email).await
        }

        async fn verify_password(&self, id: &str, password: &str) -> anyhow::Result<bool> {
            self.inner.verify_password(id, password).await
        }

        async fn update_account(&self, update: &AccountUpdate) -> anyhow::Result<Option<Account>> {
            self.inner.update_account(update).await
        }

        async fn delete(&self, id: &str) -> anyhow::Result<Option<Account>> {
            UserRepository::delete(self.inner.as_ref(), id).await
        }

        async fn get_profile(&self, id: &str) -> anyhow::Result<Option<Profile>> {
            let profile = self.inner.get_profile(id).await;
            self.wait().await;
            profile
        }

        async fn get_batch_of_profiles(&self, ids: &[String]) -> anyhow::Result<Vec<Profile>> {
            let profiles = self.inner.get_batch_of_profiles(ids).await;
            self.wait().await;
            profiles
        }

        async fn update_profile(&self, profile: &Profile) -> anyhow::Result<()> {
            self.inner.update_profile(profile).await
        }
    }

    async fn gated_setup() -> (ProfileCache, Arc<GatedUsers>, Arc<InMemoryHr>, Vec<String>) {
        let (cache, hr, ids) = setup().await;
        let users = Arc::new(GatedUsers::new(hr.clone()));
        let gated = ProfileCache::new(cache.manager, cache.ledger, users.clone());
        (gated, users, hr, ids)
    }

    async fn rename(hr: &InMemoryHr, id: &str, name: &str) {
        let mut profile = UserRepository::get_profile(hr, id).await.unwrap().unwrap();
        profile.name = name.into();
        hr.put_profile(profile);
    }

    fn spawn_get(
        cache: &ProfileCache,
        id: &str,
    ) -> tokio::task::JoinHandle<ServiceResult<Option<Profile>>> {
        let cache = cache.clone();
        let id = id.to_string();
        tokio::spawn(async move { cache.get(&id).await })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    async fn setup() -> (ProfileCache, Arc<InMemoryHr>, Vec<String>) {
        let config = CacheConfig::default();
        let store = Arc::new(CostAwareStore::new(config.max_cost));
        let manager = Arc::new(CacheManager::new(store.clone(), config.clone()));
        let ledger = Arc::new(InvalidationLedger::new(store, 100, config.default_ttl));
        let hr = Arc::new(InMemoryHr::new());

        let mut ids = Vec::new();
        for email in ["a@x.io", "b@x.io", "c@x.io"] {
            let account = UserRepository::create(
                hr.as_ref(),
                &Credentials {
                    email: email.into(),
                    password: "password".into(),
                },
            )
            .await
            .unwrap()
            .unwrap();
            ids.push(account.id);
        }

        (ProfileCache::new(manager, ledger, hr.clone()), hr, ids)
    }

    #[tokio::test]
    async fn test_batch_populates_ledger_ids() {
        let (cache, hr, ids) = setup().await;
        cache.invalidate(&ids[1], None);

        let a = cache.get(&ids[0]).await.unwrap().unwrap();
        assert_eq!(a.email, "a@x.io");
        assert_eq!(hr.calls().profile_batch, 1);

        let b = cache.get(&ids[1]).await.unwrap().unwrap();
        assert_eq!(b.email, "b@x.io");
        assert_eq!(hr.calls().profile_batch, 1);
        assert!(cache.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_is_none() {
        let (cache, _hr, _ids) = setup().await;
        assert!(cache.get("ghost").await.unwrap().is_none());
        assert!(cache.cached("ghost").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_mode_skips_ledger() {
        let (cache, hr, ids) = setup().await;
        let cache = cache.with_batching(false);
        cache.invalidate(&ids[1], None);

        cache.get(&ids[0]).await.unwrap();

        assert_eq!(hr.calls().profile, 1);
        assert_eq!(hr.calls().profile_batch, 0);
        assert!(cache.cached(&ids[1]).unwrap().is_none());
        assert_eq!(cache.ledger.snapshot(), vec![ids[1].clone()]);
    }

    /// Two batches read the same old profile; the one that commits after a
    /// write still drops it
    #[tokio::test]
    async fn test_overlapping_batches_drop_profile_written_between_commits() {
        let (cache, users, hr, ids) = gated_setup().await;
        let (a, b, c) = (&ids[0], &ids[1], &ids[2]);
        cache.invalidate(a, None);

        let first_gate = users.gate();
        let second_gate = users.gate();
        let first = spawn_get(&cache, b);
        settle().await;
        let second = spawn_get(&cache, c);
        settle().await;

        first_gate.send(()).unwrap();
        first.await.unwrap().unwrap();
        assert!(cache.ledger.is_empty());

        rename(&hr, a, "New").await;
        cache.invalidate(a, None);

        second_gate.send(()).unwrap();
        second.await.unwrap().unwrap();

        assert!(cache.cached(a).unwrap().is_none());
        assert_eq!(cache.ledger.snapshot(), vec![a.clone()]);
        assert_eq!(cache.get(a).await.unwrap().unwrap().name, "New");
    }

    /// The newer batch commits first and consumes the write; the older batch
    /// still drops the old profile it cached
    #[tokio::test]
    async fn test_older_batch_committing_last_drops_its_stale_read() {
        let (cache, users, hr, ids) = gated_setup().await;
        let (a, b, c) = (&ids[0], &ids[1], &ids[2]);
        cache.invalidate(a, None);

        let older_gate = users.gate();
        let newer_gate = users.gate();
        let older = spawn_get(&cache, b);
        settle().await;

        rename(&hr, a, "New").await;
        cache.invalidate(a, None);
        let newer = spawn_get(&cache, c);
        settle().await;

        newer_gate.send(()).unwrap();
        newer.await.unwrap().unwrap();
        assert_eq!(cache.cached(a).unwrap().unwrap().name, "New");
        assert!(cache.ledger.is_empty());

        older_gate.send(()).unwrap();
        older.await.unwrap().unwrap();

        assert!(cache.cached(a).unwrap().is_none());
        assert_eq!(cache.get(a).await.unwrap().unwrap().name, "New");
    }

    /// A single fetch racing a write drops its read even when the ledger is
    /// too full to record the id
    #[tokio::test]
    async fn test_single_fetch_racing_write_with_full_ledger() {
        let (cache, users, hr, ids) = gated_setup().await;
        let cache = cache.with_batching(false);
        let a = &ids[0];
        for i in 0..cache.ledger.capacity() {
            assert!(cache.ledger.push(&format!("u{i}")));
        }

        let gate = users.gate();
        let reader = spawn_get(&cache, a);
        settle().await;

        rename(&hr, a, "New").await;
        assert!(!cache.invalidate(a, None));

        gate.send(()).unwrap();
        let read = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(read.name, "");

        assert!(cache.cached(a).unwrap().is_none());
        assert_eq!(cache.get(a).await.unwrap().unwrap().name, "New");
    }
}
