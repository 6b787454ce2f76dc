//! Common utilities for integration tests
//!
//! This module provides shared test infrastructure including:
//! - Isolated cache systems wired to in-memory repositories
//! - Test data generators
//! - Unique key helpers

#![allow(dead_code)]

use hr_cache::memory::{InMemoryHr, UuidTokenIssuer};
use hr_cache::{
    CacheConfig, CacheSystem, CacheSystemBuilder, Credentials, DepartmentService, Employee,
    EmployeeService, UserRepository, UserService,
};
use std::sync::Arc;

/// Create a test key with unique suffix
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Install a log subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Everything a service-level test needs, sharing one cache and one database
pub struct TestApp {
    pub cache: CacheSystem,
    pub hr: Arc<InMemoryHr>,
    pub departments: DepartmentService,
    pub employees: EmployeeService,
    pub users: UserService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        init_tracing();
        let cache = CacheSystemBuilder::new().with_config(config).build();
        let hr = Arc::new(InMemoryHr::new());

        Self {
            departments: DepartmentService::new(&cache, hr.clone()),
            employees: EmployeeService::new(&cache, hr.clone()),
            users: UserService::new(&cache, hr.clone(), Arc::new(UuidTokenIssuer)),
            cache,
            hr,
        }
    }

    /// Register a user and return its id
    pub async fn register(&self, email: &str) -> String {
        self.users
            .register(&test_data::credentials(email))
            .await
            .unwrap();
        self.hr.find_by_email(email).await.unwrap().unwrap().id
    }
}

/// Generate test data of various types
pub mod test_data {
    use super::*;

    pub fn credentials(email: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: "correct horse".to_string(),
        }
    }

    pub fn employee(n: usize, department_id: &str) -> Employee {
        Employee {
            identity_number: format!("ID{n:05}"),
            name: format!("Employee {n}"),
            employee_image_uri: format!("https://img.example.com/{n}.png"),
            gender: if n % 2 == 0 { "male" } else { "female" }.to_string(),
            department_id: department_id.to_string(),
        }
    }

    pub fn email(n: usize) -> String {
        format!("user{n}@example.com")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let key1 = test_key("user");
        let key2 = test_key("user");
        assert_ne!(key1, key2, "Keys should be unique");
        assert!(key1.starts_with("test_user_"));
    }

    #[test]
    fn test_data_generation() {
        let employee = test_data::employee(7, "d1");
        assert_eq!(employee.identity_number, "ID00007");
        assert_eq!(employee.gender, "female");
    }
}
