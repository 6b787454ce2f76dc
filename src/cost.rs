//! Cost multiplier for list-query entries
//!
//! Browse queries (no search filter) near the first page are the ones most
//! likely to be repeated verbatim, so their entries are stored with a higher
//! cost and outrank filtered or deep-page entries under eviction pressure.

use crate::domain::{DepartmentQuery, EmployeeQuery};

pub const FIRST_PAGE_MULTIPLIER: i64 = 4;
pub const SECOND_PAGE_MULTIPLIER: i64 = 3;
pub const LATER_PAGE_MULTIPLIER: i64 = 2;
pub const FILTERED_MULTIPLIER: i64 = 1;

/// 1-based page number of an offset. A zero limit counts as page 1.
#[must_use]
pub const fn page_number(limit: u32, offset: u32) -> u32 {
    if limit == 0 { 1 } else { offset / limit + 1 }
}

/// Multiplier for a list query
#[must_use]
pub const fn cost_multiplier(filtered: bool, limit: u32, offset: u32) -> i64 {
    if filtered {
        return FILTERED_MULTIPLIER;
    }
    match page_number(limit, offset) {
        1 => FIRST_PAGE_MULTIPLIER,
        2 => SECOND_PAGE_MULTIPLIER,
        _ => LATER_PAGE_MULTIPLIER,
    }
}

/// List queries that can be weighted
pub trait Weighted {
    fn cost_multiplier(&self) -> i64;
}

impl Weighted for DepartmentQuery {
    fn cost_multiplier(&self) -> i64 {
        cost_multiplier(self.is_filtered(), self.limit, self.offset)
    }
}

impl Weighted for EmployeeQuery {
    fn cost_multiplier(&self) -> i64 {
        cost_multiplier(self.is_filtered(), self.limit, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number() {
        assert_eq!(page_number(5, 0), 1);
        assert_eq!(page_number(5, 4), 1);
        assert_eq!(page_number(5, 5), 2);
        assert_eq!(page_number(5, 10), 3);
        assert_eq!(page_number(0, 100), 1);
    }

    #[test]
    fn test_browse_pages() {
        assert_eq!(EmployeeQuery::new("m").page(5, 0).cost_multiplier(), 4);
        assert_eq!(EmployeeQuery::new("m").page(5, 5).cost_multiplier(), 3);
        assert_eq!(EmployeeQuery::new("m").page(5, 50).cost_multiplier(), 2);
    }

    #[test]
    fn test_any_filter_is_lowest() {
        assert_eq!(EmployeeQuery::new("m").page(5, 0).gender("male").cost_multiplier(), 1);
        assert_eq!(DepartmentQuery::new("m").name("Ops").cost_multiplier(), 1);
    }
}
