//! Collaborator interfaces
//!
//! The cache only ever talks to the source of truth through these traits, and
//! only on a miss or a mutation. Errors are opaque `anyhow` errors; the service
//! layer forwards them unchanged.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{
    Account, AccountUpdate, Credentials, Department, DepartmentQuery, Employee, EmployeePatch,
    EmployeeQuery, Profile,
};

/// Result of a guarded delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// The row is still referenced (a department with employees)
    InUse,
}

#[async_trait]
pub trait DepartmentRepository: Send + Sync {
    async fn create(&self, manager_id: &str, name: &str) -> Result<Department>;

    /// Rows in storage order, filtered by name substring and scoped to the manager
    async fn get_all(&self, query: &DepartmentQuery) -> Result<Vec<Department>>;

    /// `None` when the department does not exist for this manager
    async fn update(&self, manager_id: &str, id: &str, name: &str) -> Result<Option<Department>>;

    async fn delete(&self, manager_id: &str, id: &str) -> Result<DeleteOutcome>;
}

#[async_trait]
pub trait EmployeeRepository: Send + Sync {
    async fn is_department_owned_by_manager(&self, department_id: &str, manager_id: &str) -> Result<bool>;

    /// Internal id of the employee with this identity number under the manager
    async fn find_employee_id(&self, identity_number: &str, manager_id: &str) -> Result<Option<String>>;

    async fn insert(&self, manager_id: &str, employee: &Employee) -> Result<()>;

    async fn update(&self, id: &str, patch: &EmployeePatch) -> Result<Employee>;

    async fn get_all(&self, query: &EmployeeQuery) -> Result<Vec<Employee>>;

    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// `None` when the email is already registered
    async fn create(&self, credentials: &Credentials) -> Result<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn verify_password(&self, id: &str, password: &str) -> Result<bool>;

    /// Returns the account as it was before the update, `None` if absent
    async fn update_account(&self, update: &AccountUpdate) -> Result<Option<Account>>;

    /// Returns the removed account, `None` if absent
    async fn delete(&self, id: &str) -> Result<Option<Account>>;

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>>;

    /// Profiles for every id that exists; unknown ids are skipped, duplicates
    /// may be collapsed
    async fn get_batch_of_profiles(&self, ids: &[String]) -> Result<Vec<Profile>>;

    async fn update_profile(&self, profile: &Profile) -> Result<()>;
}

/// Issues bearer tokens for authenticated users
pub trait TokenIssuer: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the token cannot be signed.
    fn issue(&self, user_id: &str) -> Result<String>;
}
