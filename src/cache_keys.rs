//! Cache key builders
//!
//! List-query keys have the shape `<family>:v<version>:<filters>` where
//! `<filters>` is a fixed-order `name=value` list joined by `&`. Every field is
//! always present; an unset filter is written as `name=` so that the order,
//! not the caller, decides the key. Values are escaped so that a filter value
//! can never forge another field.
//!
//! Point keys (`auth:<email>`, `user:<id>`) carry no version: they are
//! invalidated by deleting them.

use std::fmt::Write;

use crate::domain::{DepartmentQuery, EmployeeQuery};
use crate::namespace::Family;

/// Cache entry holding the recently invalidated profile ids
pub const INVALIDATED_USER_IDS: &str = "invalidated_user_ids";

/// Email → issued token
#[must_use]
pub fn auth_email_to_token(email: &str) -> String {
    format!("auth:{email}")
}

/// User id → profile record
#[must_use]
pub fn user_profile(id: &str) -> String {
    format!("user:{id}")
}

#[must_use]
pub fn department_list(version: i64, query: &DepartmentQuery) -> String {
    let limit = query.limit.to_string();
    let offset = query.offset.to_string();
    list_key(
        Family::Departments,
        version,
        &[
            ("limit", &limit),
            ("offset", &offset),
            ("managerId", &query.manager_id),
            ("name", &query.name),
        ],
    )
}

#[must_use]
pub fn employee_list(version: i64, query: &EmployeeQuery) -> String {
    let limit = query.limit.to_string();
    let offset = query.offset.to_string();
    list_key(
        Family::Employees,
        version,
        &[
            ("limit", &limit),
            ("offset", &offset),
            ("managerId", &query.manager_id),
            ("identityNumber", &query.identity_number),
            ("name", &query.name),
            ("gender", &query.gender),
            ("departmentId", &query.department_id),
        ],
    )
}

fn list_key(family: Family, version: i64, filters: &[(&str, &str)]) -> String {
    let mut key = format!("{family}:v{version}:");
    for (i, (name, value)) in filters.iter().enumerate() {
        if i > 0 {
            key.push('&');
        }
        key.push_str(name);
        key.push('=');
        escape_into(&mut key, value);
    }
    key
}

/// Percent-escape the separators used by the filter list
fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '%' | '&' | '=' => {
                let _ = write!(out, "%{:02X}", c as u32);
            }
            _ => out.push(c),
        }
    }
}
