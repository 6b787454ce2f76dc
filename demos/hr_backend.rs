//! HR backend walkthrough
//!
//! Wires the cache system to the in-memory repositories and exercises every
//! cached path: list queries, namespace invalidation, tokens and batched
//! profile reads.
//!
//! Run with: `RUST_LOG=hr_cache=debug cargo run --example hr_backend`

use hr_cache::memory::{InMemoryHr, UuidTokenIssuer};
use hr_cache::{
    CacheSystemBuilder, Credentials, DepartmentQuery, DepartmentService, Employee,
    EmployeeQuery, EmployeeService, Family, ProfilePatch, UserRepository, UserService,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hr_cache=info")),
        )
        .init();

    println!("=== HR Backend Cache Walkthrough ===\n");

    let cache = CacheSystemBuilder::new().build();
    let hr = Arc::new(InMemoryHr::new());
    let departments = DepartmentService::new(&cache, hr.clone());
    let employees = EmployeeService::new(&cache, hr.clone());
    let users = UserService::new(&cache, hr.clone(), Arc::new(UuidTokenIssuer));

    // Accounts
    println!("1. Registering managers...");
    let mut manager_ids = Vec::new();
    for email in ["ada@example.com", "grace@example.com", "linus@example.com"] {
        let token = users
            .register(&Credentials {
                email: email.into(),
                password: "correct horse".into(),
            })
            .await?;
        println!("   {} -> {}", token.email, token.token);
        if let Some(account) = hr.find_by_email(email).await? {
            manager_ids.push(account.id);
        }
    }
    println!("   Ledger now holds {} ids\n", cache.ledger().len());

    // Profiles
    println!("2. Reading profiles...");
    for id in &manager_ids {
        let profile = users.get_profile(id).await?;
        println!("   {} <{}>", profile.id, profile.email);
    }
    let calls = hr.calls();
    println!(
        "   Repository calls: {} batch, {} single\n",
        calls.profile_batch, calls.profile
    );

    let manager = manager_ids.first().cloned().unwrap_or_default();
    users
        .update_profile(
            &manager,
            &ProfilePatch {
                name: Some("Ada Lovelace".into()),
                company_name: Some("Analytical Engines".into()),
                ..ProfilePatch::default()
            },
        )
        .await?;
    let profile = users.get_profile(&manager).await?;
    println!("3. Updated profile: {} at {}\n", profile.name, profile.company_name);

    // Departments and employees
    println!("4. Department and employee lists...");
    let engineering = departments.create(&manager, "Engineering").await?;
    departments.create(&manager, "Operations").await?;
    for n in 0..3 {
        employees
            .create(
                &manager,
                &Employee {
                    identity_number: format!("EMP{n:04}"),
                    name: format!("Engineer {n}"),
                    employee_image_uri: format!("https://img.example.com/{n}.png"),
                    gender: if n % 2 == 0 { "female" } else { "male" }.into(),
                    department_id: engineering.id.clone(),
                },
            )
            .await?;
    }

    let query = EmployeeQuery::new(manager.as_str());
    for round in 1..=3 {
        let rows = employees.get_all(&query).await?;
        println!(
            "   Round {round}: {} employees, repository list calls: {}",
            rows.len(),
            hr.calls().employee_list
        );
    }

    let list = departments.get_all(&DepartmentQuery::new(manager.as_str())).await?;
    println!("   Departments: {:?}", list.iter().map(|d| &d.name).collect::<Vec<_>>());
    println!(
        "   Namespace versions: departments v{}, employees v{}\n",
        cache.namespaces().current_version(Family::Departments),
        cache.namespaces().current_version(Family::Employees)
    );

    // Store health
    let stats = cache.cache_manager().get_stats();
    println!("5. Store statistics:");
    println!("   Entries: {}", stats.entries);
    println!("   Cost: {}/{}", stats.used_cost, stats.max_cost);
    println!("   Hits: {}, misses: {}", stats.hits, stats.misses);
    println!("   Evictions: {}, rejected: {}", stats.evictions, stats.rejected);
    println!("   Healthy: {}", cache.health_check());

    println!("\n=== Walkthrough Complete ===");
    Ok(())
}
