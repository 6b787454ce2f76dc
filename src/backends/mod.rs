//! Entry Store Backends
//!
//! # Available Backends
//!
//! - **`CostAwareStore`** - Cost-budgeted in-memory store with per-entry TTL
//!   and score-based eviction (default)
//!
//! Custom stores plug in through [`CacheBackend`](crate::traits::CacheBackend)
//! and [`CacheSystemBuilder::with_store`](crate::CacheSystemBuilder::with_store).

pub mod cost_aware;

pub use cost_aware::{CostAwareStore, DEFAULT_MAX_COST};
