//! Namespace Versioning
//!
//! One counter per list-query family. The current version is folded into every
//! list-query key, so bumping it orphans the whole family at once: stale
//! entries stay in the store until they expire or get evicted, but no new key
//! can reach them.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

/// Version every family starts at
pub const INITIAL_VERSION: i64 = 1;

/// A group of list-query entries sharing one version counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Departments,
    Employees,
}

impl Family {
    pub const ALL: [Self; 2] = [Self::Departments, Self::Employees];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Departments => "departments",
            Self::Employees => "employees",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-family version counters
///
/// Counters only ever increase. A fresh instance starts every family at
/// [`INITIAL_VERSION`], matching an empty store after a restart.
#[derive(Debug)]
pub struct NamespaceVersions {
    departments: AtomicI64,
    employees: AtomicI64,
}

impl NamespaceVersions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            departments: AtomicI64::new(INITIAL_VERSION),
            employees: AtomicI64::new(INITIAL_VERSION),
        }
    }

    const fn counter(&self, family: Family) -> &AtomicI64 {
        match family {
            Family::Departments => &self.departments,
            Family::Employees => &self.employees,
        }
    }

    #[must_use]
    pub fn current_version(&self, family: Family) -> i64 {
        self.counter(family).load(Ordering::Acquire)
    }

    /// Bump a family's version, returning the new one
    pub fn invalidate(&self, family: Family) -> i64 {
        let version = self.counter(family).fetch_add(1, Ordering::AcqRel) + 1;
        debug!(family = %family, version, "Namespace invalidated");
        version
    }
}

impl Default for NamespaceVersions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_families_start_at_one() {
        let versions = NamespaceVersions::new();
        for family in Family::ALL {
            assert_eq!(versions.current_version(family), INITIAL_VERSION);
        }
    }

    #[test]
    fn test_invalidate_touches_only_its_family() {
        let versions = NamespaceVersions::new();

        assert_eq!(versions.invalidate(Family::Employees), 2);
        assert_eq!(versions.current_version(Family::Employees), 2);
        assert_eq!(versions.current_version(Family::Departments), 1);
    }

    #[test]
    fn test_concurrent_invalidations_are_not_lost() {
        let versions = Arc::new(NamespaceVersions::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let versions = Arc::clone(&versions);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        versions.invalidate(Family::Departments);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(versions.current_version(Family::Departments), 8001);
    }
}
