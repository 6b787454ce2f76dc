//! Cache System Builder
//!
//! Assembles a [`CacheSystem`] from a configuration and an optional custom
//! entry store.
//!
//! # Example: Defaults
//!
//! ```rust
//! use hr_cache::CacheSystemBuilder;
//!
//! let cache = CacheSystemBuilder::new().build();
//! assert_eq!(cache.store.name(), "CostAware");
//! ```
//!
//! # Example: Custom Store
//!
//! ```rust
//! use hr_cache::{CacheConfig, CacheSystemBuilder, CostAwareStore};
//! use std::sync::Arc;
//!
//! // One store shared with another subsystem, with its own budget
//! let shared = Arc::new(CostAwareStore::new(64 << 20));
//! let cache = CacheSystemBuilder::new()
//!     .with_config(CacheConfig { ledger_capacity: 10, ..CacheConfig::default() })
//!     .with_store(shared.clone())
//!     .build();
//! assert_eq!(cache.ledger.capacity(), 10);
//! assert_eq!(cache.cache_manager().get_stats().max_cost, 64 << 20);
//! ```

use std::sync::Arc;
use tracing::info;

use crate::backends::CostAwareStore;
use crate::config::{CacheConfig, CacheStrategy};
use crate::ledger::InvalidationLedger;
use crate::namespace::NamespaceVersions;
use crate::traits::CacheBackend;
use crate::{CacheManager, CacheSystem};

/// Builder for [`CacheSystem`]
///
/// Without a custom store, `build()` creates a [`CostAwareStore`] sized by
/// `config.max_cost`. A custom store brings its own budget.
#[derive(Default)]
pub struct CacheSystemBuilder {
    config: CacheConfig,
    store: Option<Arc<dyn CacheBackend>>,
}

impl CacheSystemBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom entry store
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CacheBackend>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn build(self) -> CacheSystem {
        let config = self.config;
        let store: Arc<dyn CacheBackend> = match self.store {
            Some(store) => store,
            None => Arc::new(CostAwareStore::new(config.max_cost)),
        };

        let cache_manager = Arc::new(CacheManager::new(Arc::clone(&store), config.clone()));
        let ledger = Arc::new(InvalidationLedger::new(
            Arc::clone(&store),
            config.ledger_capacity,
            config.ttl_for(CacheStrategy::Default),
        ));

        info!(
            backend = store.name(),
            max_cost = config.max_cost,
            batch_profiles = config.batch_profiles,
            "Cache system built"
        );

        CacheSystem {
            config,
            store,
            cache_manager,
            namespaces: Arc::new(NamespaceVersions::new()),
            ledger,
        }
    }
}
