//! In-memory collaborators
//!
//! Process-local implementations of the repository traits and a token issuer.
//! They back the demo and the test suite, count the calls the cache is meant
//! to avoid, and can be switched into a failing or slow mode.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    Account, AccountUpdate, Credentials, Department, DepartmentQuery, Employee, EmployeePatch,
    EmployeeQuery, Profile,
};
use crate::repository::{
    DeleteOutcome, DepartmentRepository, EmployeeRepository, TokenIssuer, UserRepository,
};

/// Read calls that reached the repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryCalls {
    pub department_list: usize,
    pub employee_list: usize,
    pub profile: usize,
    pub profile_batch: usize,
}

#[derive(Default)]
struct CallCounters {
    department_list: AtomicUsize,
    employee_list: AtomicUsize,
    profile: AtomicUsize,
    profile_batch: AtomicUsize,
}

struct DepartmentRow {
    manager_id: String,
    department: Department,
}

struct EmployeeRow {
    id: String,
    manager_id: String,
    employee: Employee,
}

struct UserRow {
    password: String,
    profile: Profile,
}

/// In-memory HR database
#[derive(Default)]
pub struct InMemoryHr {
    departments: RwLock<Vec<DepartmentRow>>,
    employees: RwLock<Vec<EmployeeRow>>,
    users: DashMap<String, UserRow>,
    calls: CallCounters,
    failing: AtomicBool,
    latency_ms: AtomicU64,
}

impl InMemoryHr {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn calls(&self) -> RepositoryCalls {
        RepositoryCalls {
            department_list: self.calls.department_list.load(Ordering::SeqCst),
            employee_list: self.calls.employee_list.load(Ordering::SeqCst),
            profile: self.calls.profile.load(Ordering::SeqCst),
            profile_batch: self.calls.profile_batch.load(Ordering::SeqCst),
        }
    }

    /// Make every read fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every read by `latency`
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Change a profile behind the cache's back
    pub fn put_profile(&self, profile: Profile) {
        if let Some(mut row) = self.users.get_mut(&profile.id) {
            row.profile = profile;
        }
    }

    async fn read(&self, counter: &AtomicUsize) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("repository unavailable"));
        }
        Ok(())
    }
}

fn page<T>(rows: impl Iterator<Item = T>, limit: u32, offset: u32) -> Vec<T> {
    rows.skip(offset as usize).take(limit as usize).collect()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl DepartmentRepository for InMemoryHr {
    async fn create(&self, manager_id: &str, name: &str) -> Result<Department> {
        let department = Department {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        self.departments.write().push(DepartmentRow {
            manager_id: manager_id.to_string(),
            department: department.clone(),
        });
        Ok(department)
    }

    async fn get_all(&self, query: &DepartmentQuery) -> Result<Vec<Department>> {
        self.read(&self.calls.department_list).await?;
        let rows = self.departments.read();
        Ok(page(
            rows.iter()
                .filter(|row| row.manager_id == query.manager_id)
                .filter(|row| contains_ignore_case(&row.department.name, &query.name))
                .map(|row| row.department.clone()),
            query.limit,
            query.offset,
        ))
    }

    async fn update(&self, manager_id: &str, id: &str, name: &str) -> Result<Option<Department>> {
        let mut rows = self.departments.write();
        Ok(rows
            .iter_mut()
            .find(|row| row.manager_id == manager_id && row.department.id == id)
            .map(|row| {
                row.department.name = name.to_string();
                row.department.clone()
            }))
    }

    async fn delete(&self, manager_id: &str, id: &str) -> Result<DeleteOutcome> {
        let in_use = self
            .employees
            .read()
            .iter()
            .any(|row| row.employee.department_id == id);

        let mut rows = self.departments.write();
        let Some(pos) = rows
            .iter()
            .position(|row| row.manager_id == manager_id && row.department.id == id)
        else {
            return Ok(DeleteOutcome::NotFound);
        };
        if in_use {
            return Ok(DeleteOutcome::InUse);
        }
        rows.remove(pos);
        Ok(DeleteOutcome::Deleted)
    }
}

#[async_trait]
impl EmployeeRepository for InMemoryHr {
    async fn is_department_owned_by_manager(&self, department_id: &str, manager_id: &str) -> Result<bool> {
        Ok(self
            .departments
            .read()
            .iter()
            .any(|row| row.manager_id == manager_id && row.department.id == department_id))
    }

    async fn find_employee_id(&self, identity_number: &str, manager_id: &str) -> Result<Option<String>> {
        Ok(self
            .employees
            .read()
            .iter()
            .find(|row| row.manager_id == manager_id && row.employee.identity_number == identity_number)
            .map(|row| row.id.clone()))
    }

    async fn insert(&self, manager_id: &str, employee: &Employee) -> Result<()> {
        self.employees.write().push(EmployeeRow {
            id: Uuid::new_v4().to_string(),
            manager_id: manager_id.to_string(),
            employee: employee.clone(),
        });
        Ok(())
    }

    async fn update(&self, id: &str, patch: &EmployeePatch) -> Result<Employee> {
        let mut rows = self.employees.write();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| anyhow!("employee {id} vanished during update"))?;

        let employee = &mut row.employee;
        for (value, target) in [
            (&patch.identity_number, &mut employee.identity_number),
            (&patch.name, &mut employee.name),
            (&patch.employee_image_uri, &mut employee.employee_image_uri),
            (&patch.gender, &mut employee.gender),
            (&patch.department_id, &mut employee.department_id),
        ] {
            if !value.is_empty() {
                target.clone_from(value);
            }
        }
        Ok(employee.clone())
    }

    async fn get_all(&self, query: &EmployeeQuery) -> Result<Vec<Employee>> {
        self.read(&self.calls.employee_list).await?;
        let identity_prefix = query.identity_number.to_lowercase();
        let rows = self.employees.read();
        Ok(page(
            rows.iter()
                .filter(|row| row.manager_id == query.manager_id)
                .map(|row| &row.employee)
                .filter(|e| e.identity_number.to_lowercase().starts_with(&identity_prefix))
                .filter(|e| contains_ignore_case(&e.name, &query.name))
                .filter(|e| query.gender.is_empty() || e.gender == query.gender)
                .filter(|e| query.department_id.is_empty() || e.department_id == query.department_id)
                .cloned(),
            query.limit,
            query.offset,
        ))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.employees.write().retain(|row| row.id != id);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryHr {
    async fn create(&self, credentials: &Credentials) -> Result<Option<Account>> {
        if self.find_by_email(&credentials.email).await?.is_some() {
            return Ok(None);
        }
        let id = Uuid::new_v4().to_string();
        self.users.insert(
            id.clone(),
            UserRow {
                password: credentials.password.clone(),
                profile: Profile {
                    id: id.clone(),
                    email: credentials.email.clone(),
                    ..Profile::default()
                },
            },
        );
        Ok(Some(Account {
            id,
            email: credentials.email.clone(),
        }))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self
            .users
            .iter()
            .find(|row| row.profile.email == email)
            .map(|row| Account {
                id: row.key().clone(),
                email: row.profile.email.clone(),
            }))
    }

    async fn verify_password(&self, id: &str, password: &str) -> Result<bool> {
        Ok(self.users.get(id).is_some_and(|row| row.password == password))
    }

    async fn update_account(&self, update: &AccountUpdate) -> Result<Option<Account>> {
        Ok(self.users.get_mut(&update.id).map(|mut row| {
            let previous = Account {
                id: update.id.clone(),
                email: row.profile.email.clone(),
            };
            row.profile.email.clone_from(&update.email);
            row.profile.name.clone_from(&update.name);
            previous
        }))
    }

    async fn delete(&self, id: &str) -> Result<Option<Account>> {
        Ok(self.users.remove(id).map(|(id, row)| Account {
            id,
            email: row.profile.email,
        }))
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        self.read(&self.calls.profile).await?;
        Ok(self.users.get(id).map(|row| row.profile.clone()))
    }

    async fn get_batch_of_profiles(&self, ids: &[String]) -> Result<Vec<Profile>> {
        self.read(&self.calls.profile_batch).await?;
        let mut seen = std::collections::HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.users.get(id).map(|row| row.profile.clone()))
            .collect())
    }

    async fn update_profile(&self, profile: &Profile) -> Result<()> {
        let mut row = self
            .users
            .get_mut(&profile.id)
            .ok_or_else(|| anyhow!("user {} not found", profile.id))?;
        row.profile = profile.clone();
        Ok(())
    }
}

/// Opaque random tokens bound to a user id
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTokenIssuer;

impl TokenIssuer for UuidTokenIssuer {
    fn issue(&self, user_id: &str) -> Result<String> {
        Ok(format!("{user_id}.{}", Uuid::new_v4().simple()))
    }
}
