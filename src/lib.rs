//! HR Cache
//!
//! The application cache of a multi-tenant HR backend:
//! - **Cost-aware entry store**: one process-wide key/value store with a byte
//!   budget, per-entry TTL and score-based eviction
//! - **Namespace versioning**: O(1) invalidation of every cached department
//!   or employee list
//! - **Cache-key builders**: deterministic keys from tenant, paging and filters
//! - **Cost multipliers**: first-page browse queries outlive filtered ones
//! - **Profile batch coalescing**: one repository round trip refreshes the
//!   requested profile and every recently invalidated one
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hr_cache::{CacheSystem, DepartmentQuery, DepartmentService};
//! use hr_cache::memory::InMemoryHr;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheSystem::new();
//!     let departments = DepartmentService::new(&cache, Arc::new(InMemoryHr::new()));
//!
//!     departments.create("manager-1", "Operations").await?;
//!
//!     // First read hits the repository, the second one the cache
//!     let query = DepartmentQuery::new("manager-1");
//!     departments.get_all(&query).await?;
//!     departments.get_all(&query).await?;
//!
//!     let stats = cache.cache_manager().get_stats();
//!     tracing::info!("Hit rate: {:.2}%", stats.hit_rate);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Service read → key (family version + filters) → store ─┬─ hit → rows
//!                                                        └─ miss → repository → store (cost × multiplier)
//! Service write → repository → bump family version / invalidate profile + ledger
//! ```

use std::sync::Arc;
use tracing::{info, warn};

pub mod backends;
pub mod builder;
pub mod cache_keys;
pub mod cache_manager;
pub mod codec;
pub mod config;
pub mod cost;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod namespace;
pub mod profile_cache;
pub mod repository;
pub mod services;
pub mod traits;

pub use backends::{CostAwareStore, DEFAULT_MAX_COST};
pub use builder::CacheSystemBuilder;
pub use cache_manager::{CacheManager, Record, populate_detached};
pub use config::{CacheConfig, CacheStrategy};
pub use domain::{
    Account, AccountUpdate, AuthToken, Credentials, Department, DepartmentQuery, Employee,
    EmployeePatch, EmployeeQuery, Profile, ProfilePatch,
};
pub use error::{CacheError, ServiceError, ServiceResult};
pub use ledger::InvalidationLedger;
pub use namespace::{Family, NamespaceVersions};
pub use profile_cache::ProfileCache;
pub use repository::{
    DeleteOutcome, DepartmentRepository, EmployeeRepository, TokenIssuer, UserRepository,
};
pub use services::{DepartmentService, EmployeeService, UserService};
pub use traits::{CacheBackend, StoreStats};

// Re-export async_trait for repository implementors
pub use async_trait::async_trait;

/// Main entry point for the cache subsystem
///
/// One instance per process. Every service is built from the same
/// `CacheSystem` so that they share the store, the namespace counters and the
/// invalidation ledger. Tests build their own isolated instance.
///
/// # Example
///
/// ```rust
/// use hr_cache::{CacheSystem, Family};
///
/// let cache = CacheSystem::new();
/// assert_eq!(cache.namespaces().current_version(Family::Employees), 1);
/// assert!(cache.health_check());
/// ```
#[derive(Clone)]
pub struct CacheSystem {
    pub config: CacheConfig,
    /// The shared entry store
    pub store: Arc<dyn CacheBackend>,
    /// Typed helpers over `store` (primary interface)
    pub cache_manager: Arc<CacheManager>,
    pub namespaces: Arc<NamespaceVersions>,
    pub ledger: Arc<InvalidationLedger>,
}

impl CacheSystem {
    /// Create a cache system with the default configuration and a
    /// [`CostAwareStore`]
    #[must_use]
    pub fn new() -> Self {
        CacheSystemBuilder::new().build()
    }

    /// Create a cache system configured from `HR_CACHE_*` variables
    #[must_use]
    pub fn from_env() -> Self {
        CacheSystemBuilder::new()
            .with_config(CacheConfig::from_env())
            .build()
    }

    /// Round-trip a probe entry through the store
    #[must_use]
    pub fn health_check(&self) -> bool {
        if self.store.health_check() {
            info!(backend = self.store.name(), "Cache health check passed");
            true
        } else {
            warn!(backend = self.store.name(), "Cache health check failed");
            false
        }
    }

    #[must_use]
    pub const fn cache_manager(&self) -> &Arc<CacheManager> {
        &self.cache_manager
    }

    #[must_use]
    pub const fn namespaces(&self) -> &Arc<NamespaceVersions> {
        &self.namespaces
    }

    #[must_use]
    pub const fn ledger(&self) -> &Arc<InvalidationLedger> {
        &self.ledger
    }
}

impl Default for CacheSystem {
    fn default() -> Self {
        Self::new()
    }
}
