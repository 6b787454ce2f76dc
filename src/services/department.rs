use std::sync::Arc;
use tracing::info;

use crate::CacheSystem;
use crate::cache_keys;
use crate::cache_manager::CacheManager;
use crate::cost::Weighted;
use crate::domain::{Department, DepartmentQuery};
use crate::error::{ServiceError, ServiceResult};
use crate::namespace::{Family, NamespaceVersions};
use crate::repository::{DeleteOutcome, DepartmentRepository};

use super::{cached_list, validate_length};

const NAME_MIN: usize = 4;
const NAME_MAX: usize = 33;

/// Departments of a manager, with cached list queries
pub struct DepartmentService {
    repo: Arc<dyn DepartmentRepository>,
    cache: Arc<CacheManager>,
    namespaces: Arc<NamespaceVersions>,
}

impl DepartmentService {
    #[must_use]
    pub fn new(system: &CacheSystem, repo: Arc<dyn DepartmentRepository>) -> Self {
        Self {
            repo,
            cache: Arc::clone(system.cache_manager()),
            namespaces: Arc::clone(system.namespaces()),
        }
    }

    /// # Errors
    ///
    /// `BadRequest` for an invalid name, or the repository error.
    pub async fn create(&self, manager_id: &str, name: &str) -> ServiceResult<Department> {
        validate_length("department name", name, NAME_MIN, NAME_MAX)?;

        let department = self.repo.create(manager_id, name).await?;
        self.namespaces.invalidate(Family::Departments);
        info!(manager_id = %manager_id, id = %department.id, "Department created");
        Ok(department)
    }

    /// # Errors
    ///
    /// The repository error on a miss, or a cache fault.
    pub async fn get_all(&self, query: &DepartmentQuery) -> ServiceResult<Vec<Department>> {
        let version = self.namespaces.current_version(Family::Departments);
        let key = cache_keys::department_list(version, query);

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
    /// `BadRequest` for an invalid name, `NotFound` if the manager has no such
    /// department, or the repository error.
    pub async fn update(&self, manager_id: &str, id: &str, name: &str) -> ServiceResult<Department> {
        validate_length("department name", name, NAME_MIN, NAME_MAX)?;

        let department = self
            .repo
            .update(manager_id, id, name)
            .await?
            .ok_or(ServiceError::NotFound)?;
        self.namespaces.invalidate(Family::Departments);
        Ok(department)
    }

    /// # Errors
    ///
    /// `NotFound`, `Conflict` while employees are still assigned, or the
    /// repository error.
    pub async fn delete(&self, manager_id: &str, id: &str) -> ServiceResult<()> {
        match self.repo.delete(manager_id, id).await? {
            DeleteOutcome::Deleted => {
                self.namespaces.invalidate(Family::Departments);
                info!(manager_id = %manager_id, id = %id, "Department deleted");
                Ok(())
            }
            DeleteOutcome::NotFound => Err(ServiceError::NotFound),
            DeleteOutcome::InUse => Err(ServiceError::Conflict),
        }
    }
}
