//! Lakebatch Test Utilities
//!
//! Docker-based PostgreSQL infrastructure for integration-testing
//! [`lakebatch_catalog`]'s `postgres` feature against a real server instead of the
//! `sqlite::memory:` pool the crate's own unit tests use.
//!
//! # Features
//!
//! - `docker-tests`: enable tests that require Docker containers
//!
//! # Usage
//!
//! ```rust,ignore
//! use lakebatch_test_utils::{DbVersion, TestPgPool, PostgresTestGuard};
//!
//! #[tokio::test]
//! #[cfg(feature = "docker-tests")]
//! async fn test_catalog_on_postgres() {
//!     let pool = TestPgPool::new(DbVersion::Postgres16).await.unwrap();
//!     let guard = PostgresTestGuard::new(pool.pool.clone()).await.unwrap();
//!
//!     // Test runs in isolated schema; dropped automatically on Drop.
//!     guard.execute("CREATE TABLE output (id INT)").await.unwrap();
//! }
//! ```

pub mod cleanup;
pub mod config;
pub mod containers;
pub mod pools;

pub use cleanup::PostgresTestGuard;
pub use config::{DbVersion, TestDbConfig};
pub use containers::lifecycle::{ensure_container_running, wait_for_healthy};
pub use pools::postgres::TestPgPool;
