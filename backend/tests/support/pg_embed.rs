//! Embedded PostgreSQL for the Diesel adapter suites.
//!
//! One cluster is shared per test binary; every test gets its own temporary
//! database with the embedded migrations applied, so suites never observe
//! each other's rows.
//!
//! Set `SKIP_TEST_CLUSTER=1` to skip these suites on hosts that cannot run
//! PostgreSQL. Without it a bootstrap failure fails the test.

use pg_embedded_setup_unpriv::TemporaryDatabase;
use pg_embedded_setup_unpriv::test_support::shared_cluster_handle;
use tokio::runtime::Runtime;

use tokengate::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};

/// Truthy values: "1", "true", "yes" (case-insensitive).
fn should_skip_test_cluster() -> bool {
    std::env::var("SKIP_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if should_skip_test_cluster() {
        eprintln!("SKIP-TEST-CLUSTER: {reason}");
        None
    } else {
        panic!("Test cluster setup failed: {reason}. Set SKIP_TEST_CLUSTER=1 to skip.");
    }
}

/// A migrated database plus the runtime its pool lives on.
///
/// Fields drop in order: the pool's connections close before the runtime
/// stops, and the database is dropped last.
pub struct TestDatabase {
    pub pool: DbPool,
    pub url: String,
    pub runtime: Runtime,
    _database: TemporaryDatabase,
}

impl TestDatabase {
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Provision a fresh migrated database, or `None` when skipping.
pub fn provision() -> Option<TestDatabase> {
    let cluster = match shared_cluster_handle() {
        Ok(cluster) => cluster,
        Err(err) => return handle_cluster_setup_failure(format!("{err:?}")),
    };
    let database = match cluster.temporary_database(format!("test_{}", uuid::Uuid::new_v4().simple())) {
        Ok(database) => database,
        Err(err) => return handle_cluster_setup_failure(format!("{err:?}")),
    };
    let url = database.url().to_owned();
    let runtime = Runtime::new().expect("tokio runtime");
    runtime
        .block_on(run_pending_migrations(&url))
        .expect("migrations apply to a fresh database");
    let pool = runtime
        .block_on(DbPool::new(PoolConfig::new(url.clone())))
        .expect("pool connects to the temporary database");
    Some(TestDatabase {
        pool,
        url,
        runtime,
        _database: database,
    })
}
