//! Domain records and list queries
//!
//! Cached payloads are flat string records (see
//! [`Record`](crate::cache_manager::Record)); every type here converts to and
//! from that shape with fixed field names.

use serde::{Deserialize, Serialize};

use crate::cache_manager::Record;

/// Page size used when a list query does not set one
pub const DEFAULT_LIMIT: u32 = 5;
pub const DEFAULT_OFFSET: u32 = 0;

pub const GENDER_MALE: &str = "male";
pub const GENDER_FEMALE: &str = "female";

fn field(record: &Record, name: &str) -> String {
    record.get(name).cloned().unwrap_or_default()
}

fn record<const N: usize>(fields: [(&str, &str); N]) -> Record {
    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

// ===== Departments =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
}

impl Department {
    #[must_use]
    pub fn to_record(&self) -> Record {
        record([("id", self.id.as_str()), ("name", self.name.as_str())])
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: field(record, "id"),
            name: field(record, "name"),
        }
    }
}

/// Department list query, always scoped to one manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentQuery {
    pub limit: u32,
    pub offset: u32,
    pub manager_id: String,
    /// Name substring
    pub name: String,
}

impl DepartmentQuery {
    #[must_use]
    pub fn new(manager_id: impl Into<String>) -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
            manager_id: manager_id.into(),
            name: String::new(),
        }
    }

    #[must_use]
    pub const fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether any search filter is set. The tenant scope is not a filter.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        !self.name.is_empty()
    }
}

// ===== Employees =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub identity_number: String,
    pub name: String,
    pub employee_image_uri: String,
    pub gender: String,
    pub department_id: String,
}

impl Employee {
    #[must_use]
    pub fn to_record(&self) -> Record {
        record([
            ("identityNumber", self.identity_number.as_str()),
            ("name", self.name.as_str()),
            ("employeeImageUri", self.employee_image_uri.as_str()),
            ("gender", self.gender.as_str()),
            ("departmentId", self.department_id.as_str()),
        ])
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            identity_number: field(record, "identityNumber"),
            name: field(record, "name"),
            employee_image_uri: field(record, "employeeImageUri"),
            gender: field(record, "gender"),
            department_id: field(record, "departmentId"),
        }
    }
}

/// Partial employee update; empty fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePatch {
    pub identity_number: String,
    pub name: String,
    pub employee_image_uri: String,
    pub gender: String,
    pub department_id: String,
}

/// Employee list query, always scoped to one manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeQuery {
    pub limit: u32,
    pub offset: u32,
    pub manager_id: String,
    /// Identity number prefix
    pub identity_number: String,
    /// Name substring
    pub name: String,
    pub gender: String,
    pub department_id: String,
}

impl EmployeeQuery {
    #[must_use]
    pub fn new(manager_id: impl Into<String>) -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
            manager_id: manager_id.into(),
            identity_number: String::new(),
            name: String::new(),
            gender: String::new(),
            department_id: String::new(),
        }
    }

    #[must_use]
    pub const fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn identity_number(mut self, prefix: impl Into<String>) -> Self {
        self.identity_number = prefix.into();
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = gender.into();
        self
    }

    #[must_use]
    pub fn department_id(mut self, department_id: impl Into<String>) -> Self {
        self.department_id = department_id.into();
        self
    }

    #[must_use]
    pub fn is_filtered(&self) -> bool {
        !(self.identity_number.is_empty()
            && self.name.is_empty()
            && self.gender.is_empty()
            && self.department_id.is_empty())
    }
}

// ===== Users =====

/// Public profile of a user/manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub user_image_uri: String,
    pub company_name: String,
    pub company_image_uri: String,
}

impl Profile {
    #[must_use]
    pub fn to_record(&self) -> Record {
        record([
            ("email", self.email.as_str()),
            ("name", self.name.as_str()),
            ("userImageUri", self.user_image_uri.as_str()),
            ("companyName", self.company_name.as_str()),
            ("companyImageUri", self.company_image_uri.as_str()),
        ])
    }

    /// The id is the cache key suffix, not part of the payload
    #[must_use]
    pub fn from_record(id: &str, record: &Record) -> Self {
        Self {
            id: id.to_string(),
            email: field(record, "email"),
            name: field(record, "name"),
            user_image_uri: field(record, "userImageUri"),
            company_name: field(record, "companyName"),
            company_image_uri: field(record, "companyImageUri"),
        }
    }
}

/// Partial profile update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub email: Option<String>,
    pub name: Option<String>,
    pub user_image_uri: Option<String>,
    pub company_name: Option<String>,
    pub company_image_uri: Option<String>,
}

impl ProfilePatch {
    pub fn apply(&self, profile: &mut Profile) {
        let fields = [
            (&self.email, &mut profile.email),
            (&self.name, &mut profile.name),
            (&self.user_image_uri, &mut profile.user_image_uri),
            (&self.company_name, &mut profile.company_name),
            (&self.company_image_uri, &mut profile.company_image_uri),
        ];
        for (patch, target) in fields {
            if let Some(value) = patch {
                target.clone_from(value);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Account fields changed through the user update path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Stored account as returned by the user repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub email: String,
    pub token: String,
}
