//! Service layer
//!
//! The cache's consumers: list reads go through versioned keys, mutations bump
//! the family version or invalidate profile entries.

pub mod department;
pub mod employee;
pub mod user;

pub use department::DepartmentService;
pub use employee::EmployeeService;
pub use user::UserService;

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

use crate::cache_manager::{CacheManager, Record, populate_detached};
use crate::config::CacheStrategy;
use crate::domain::{Department, Employee};
use crate::error::{ServiceError, ServiceResult};

/// Rows stored in list-query entries
pub(crate) trait ListRow: Sized + Send + 'static {
    fn to_record(&self) -> Record;
    fn from_record(record: &Record) -> Self;
}

impl ListRow for Department {
    fn to_record(&self) -> Record {
        Self::to_record(self)
    }

    fn from_record(record: &Record) -> Self {
        Self::from_record(record)
    }
}

impl ListRow for Employee {
    fn to_record(&self) -> Record {
        Self::to_record(self)
    }

    fn from_record(record: &Record) -> Self {
        Self::from_record(record)
    }
}

/// Serve a list query from the cache, or run `fetch` and cache its rows
///
/// The fetch runs detached, so the rows are cached even if the caller goes away.
pub(crate) async fn cached_list<T, Fut>(
    cache: &Arc<CacheManager>,
    key: String,
    cost_multiplier: i64,
    fetch: Fut,
) -> ServiceResult<Vec<T>>
where
    T: ListRow,
    Fut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
{
    if let Some(records) = cache.get_as_map_array(&key)? {
        debug!(key = %key, rows = records.len(), "List cache hit");
        return Ok(records.iter().map(T::from_record).collect());
    }
    debug!(key = %key, "List cache miss");

    let cache = Arc::clone(cache);
    populate_detached(async move {
        let rows = fetch.await.inspect_err(|e| {
            error!(key = %key, error = %e, "List query failed");
        })?;

        let records: Vec<Record> = rows.iter().map(T::to_record).collect();
        cache.set_as_map_array_with_ttl_and_cost_multiplier(
            &key,
            &records,
            cost_multiplier,
            cache.ttl_for(CacheStrategy::ListQuery),
        )?;
        Ok::<_, ServiceError>(rows)
    })
    .await?
}

pub(crate) fn validate_length(field: &str, value: &str, min: usize, max: usize) -> ServiceResult<()> {
    let len = value.chars().count();
    if (min..=max).contains(&len) {
        Ok(())
    } else {
        Err(ServiceError::BadRequest(format!(
            "{field} must be between {min} and {max} characters"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_length_bounds() {
        assert!(validate_length("name", "abcd", 4, 33).is_ok());
        assert!(validate_length("name", &"a".repeat(33), 4, 33).is_ok());
        assert!(matches!(
            validate_length("name", "abc", 4, 33),
            Err(ServiceError::BadRequest(_))
        ));
        assert!(validate_length("name", &"a".repeat(34), 4, 33).is_err());
    }
}
