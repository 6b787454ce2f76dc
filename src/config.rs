//! Cache Configuration
//!
//! Read once at process start. Nothing here is reconfigurable at runtime; a
//! new configuration means a new [`CacheSystem`](crate::CacheSystem).

use std::time::Duration;
use tracing::warn;

use crate::backends::DEFAULT_MAX_COST;

/// Default TTL for department and employee list queries
pub const DEFAULT_LIST_TTL: Duration = Duration::from_secs(5 * 60);
/// Default TTL for email→token entries and the invalidation ledger
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
/// Default TTL for profile entries
pub const DEFAULT_PROFILE_TTL: Duration = Duration::from_secs(5 * 60);
/// Maximum number of ids remembered by the invalidation ledger
pub const DEFAULT_LEDGER_CAPACITY: usize = 100;

/// Cache families with their own TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Department and employee list queries
    ListQuery,
    /// Email → token entries
    AuthToken,
    /// User/manager profiles
    Profile,
    /// Untyped entries written through the plain `set` helpers
    Default,
}

/// Configuration for the cache subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Global cost budget of the entry store, in bytes
    pub max_cost: i64,
    pub list_ttl: Duration,
    pub auth_token_ttl: Duration,
    pub profile_ttl: Duration,
    /// TTL of plain entries, including the invalidation ledger
    pub default_ttl: Duration,
    pub ledger_capacity: usize,
    /// Fetch profiles in batches together with recently invalidated ids
    pub batch_profiles: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cost: DEFAULT_MAX_COST,
            list_ttl: DEFAULT_LIST_TTL,
            auth_token_ttl: DEFAULT_TTL,
            profile_ttl: DEFAULT_PROFILE_TTL,
            default_ttl: DEFAULT_TTL,
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
            batch_profiles: true,
        }
    }
}

impl CacheConfig {
    /// Build a configuration from `HR_CACHE_*` environment variables
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `HR_CACHE_MAX_COST` | cost budget in bytes |
    /// | `HR_CACHE_LIST_TTL_SECS` | list query TTL |
    /// | `HR_CACHE_AUTH_TTL_SECS` | email→token TTL |
    /// | `HR_CACHE_PROFILE_TTL_SECS` | profile TTL |
    /// | `HR_CACHE_LEDGER_CAPACITY` | invalidation ledger capacity |
    /// | `HR_CACHE_BATCH_PROFILES` | `true`/`false` |
    ///
    /// Unset variables keep their defaults; malformed ones are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(max_cost) = parse(&lookup, "HR_CACHE_MAX_COST") {
            config.max_cost = max_cost;
        }
        if let Some(secs) = parse(&lookup, "HR_CACHE_LIST_TTL_SECS") {
            config.list_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "HR_CACHE_AUTH_TTL_SECS") {
            config.auth_token_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "HR_CACHE_PROFILE_TTL_SECS") {
            config.profile_ttl = Duration::from_secs(secs);
        }
        if let Some(capacity) = parse(&lookup, "HR_CACHE_LEDGER_CAPACITY") {
            config.ledger_capacity = capacity;
        }
        if let Some(enabled) = parse(&lookup, "HR_CACHE_BATCH_PROFILES") {
            config.batch_profiles = enabled;
        }

        config
    }

    /// TTL for a cache family
    #[must_use]
    pub const fn ttl_for(&self, strategy: CacheStrategy) -> Duration {
        match strategy {
            CacheStrategy::ListQuery => self.list_ttl,
            CacheStrategy::AuthToken => self.auth_token_ttl,
            CacheStrategy::Profile => self.profile_ttl,
            CacheStrategy::Default => self.default_ttl,
        }
    }
}

fn parse<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(variable = name, value = %raw, error = %e, "Ignoring malformed cache setting");
            None
        }
    }
}
