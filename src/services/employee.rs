use std::sync::Arc;
use tracing::info;

use crate::CacheSystem;
use crate::cache_keys;
use crate::cache_manager::CacheManager;
use crate::cost::Weighted;
use crate::domain::{Employee, EmployeePatch, EmployeeQuery, GENDER_FEMALE, GENDER_MALE};
use crate::error::{ServiceError, ServiceResult};
use crate::namespace::{Family, NamespaceVersions};
use crate::repository::EmployeeRepository;

use super::{cached_list, validate_length};

fn validate_identity_number(value: &str) -> ServiceResult<()> {
    validate_length("identity number", value, 5, 33)
}

fn validate_name(value: &str) -> ServiceResult<()> {
    validate_length("name", value, 4, 33)
}

fn validate_gender(value: &str) -> ServiceResult<()> {
    if value == GENDER_MALE || value == GENDER_FEMALE {
        Ok(())
    } else {
        Err(ServiceError::BadRequest(format!("unknown gender '{value}'")))
    }
}

fn validate_new(employee: &Employee) -> ServiceResult<()> {
    validate_identity_number(&employee.identity_number)?;
    validate_name(&employee.name)?;
    validate_gender(&employee.gender)?;
    if employee.employee_image_uri.is_empty() {
        return Err(ServiceError::BadRequest("employee image uri is required".into()));
    }
    if employee.department_id.is_empty() {
        return Err(ServiceError::BadRequest("department id is required".into()));
    }
    Ok(())
}

fn validate_patch(patch: &EmployeePatch) -> ServiceResult<()> {
    if !patch.identity_number.is_empty() {
        validate_identity_number(&patch.identity_number)?;
    }
    if !patch.name.is_empty() {
        validate_name(&patch.name)?;
    }
    if !patch.gender.is_empty() {
        validate_gender(&patch.gender)?;
    }
    Ok(())
}

/// Employees of a manager's departments, with cached list queries
pub struct EmployeeService {
    repo: Arc<dyn EmployeeRepository>,
    cache: Arc<CacheManager>,
    namespaces: Arc<NamespaceVersions>,
}

impl EmployeeService {
    #[must_use]
    pub fn new(system: &CacheSystem, repo: Arc<dyn EmployeeRepository>) -> Self {
        Self {
            repo,
            cache: Arc::clone(system.cache_manager()),
            namespaces: Arc::clone(system.namespaces()),
        }
    }

    async fn ensure_department_owned(&self, department_id: &str, manager_id: &str) -> ServiceResult<()> {
        if self.repo.is_department_owned_by_manager(department_id, manager_id).await? {
            Ok(())
        } else {
            Err(ServiceError::BadRequest(format!("invalid department id '{department_id}'")))
        }
    }

    /// # Errors
    ///
    /// `BadRequest` for invalid fields or a department the manager does not
    /// own, `Conflict` for a duplicate identity number, or the repository error.
    pub async fn create(&self, manager_id: &str, employee: &Employee) -> ServiceResult<Employee> {
        validate_new(employee)?;
        self.ensure_department_owned(&employee.department_id, manager_id).await?;
        if self
            .repo
            .find_employee_id(&employee.identity_number, manager_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict);
        }

        self.repo.insert(manager_id, employee).await?;
        self.namespaces.invalidate(Family::Employees);
        info!(manager_id = %manager_id, identity_number = %employee.identity_number, "Employee created");
        Ok(employee.clone())
    }

    /// # Errors
    ///
    /// The repository error on a miss, or a cache fault.
    pub async fn get_all(&self, query: &EmployeeQuery) -> ServiceResult<Vec<Employee>> {
        let version = self.namespaces.current_version(Family::Employees);
        let key = cache_keys::employee_list(version, query);

        let repo = Arc::clone(&self.repo);
        let owned = query.clone();
        cached_list(
            &self.cache,
            key,
            query.cost_multiplier(),
            async move { repo.get_all(&owned).await },
        )
        .await
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown identity number, `BadRequest` for invalid
    /// fields, `Conflict` if the new identity number is taken, or the
    /// repository error.
    pub async fn update(
        &self,
        manager_id: &str,
        identity_number: &str,
        patch: &EmployeePatch,
    ) -> ServiceResult<Employee> {
        validate_patch(patch)?;
        let id = self
            .repo
            .find_employee_id(identity_number, manager_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if !patch.department_id.is_empty() {
            self.ensure_department_owned(&patch.department_id, manager_id).await?;
        }
        if !patch.identity_number.is_empty() {
            let holder = self.repo.find_employee_id(&patch.identity_number, manager_id).await?;
            if holder.is_some_and(|holder| holder != id) {
                return Err(ServiceError::Conflict);
            }
        }

        let employee = self.repo.update(&id, patch).await?;
        self.namespaces.invalidate(Family::Employees);
        Ok(employee)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown identity number, or the repository error.
    pub async fn delete(&self, manager_id: &str, identity_number: &str) -> ServiceResult<()> {
        let id = self
            .repo
            .find_employee_id(identity_number, manager_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        self.repo.delete(&id).await?;
        self.namespaces.invalidate(Family::Employees);
        info!(manager_id = %manager_id, identity_number = %identity_number, "Employee deleted");
        Ok(())
    }
}
