//! Integration tests for Docker test infrastructure.
//!
//! These tests require Docker to be running and the containers to be started.
//!
//! Run with:
//!   docker compose -f crates/lakebatch_test_utils/docker/docker-compose.yml up -d
//!   cargo test -p lakebatch_test_utils --features docker-tests

#![cfg(feature = "docker-tests")]

use lakebatch_catalog::{CatalogBackend, CatalogConfig, CatalogStore, RunStatus};
use lakebatch_test_utils::{DbVersion, PostgresTestGuard, TestDbConfig, TestPgPool};

/// Test that we can connect to PostgreSQL 16 and run a simple query.
#[tokio::test]
async fn test_postgres16_connection() {
    let pool = TestPgPool::new(DbVersion::Postgres16).await.unwrap();
    pool.execute("SELECT 1").await.unwrap();
}

/// Test that PostgresTestGuard creates an isolated schema.
#[tokio::test]
async fn test_postgres_test_guard_isolation() {
    let pool = TestPgPool::new(DbVersion::Postgres16).await.unwrap();

    let guard1 = PostgresTestGuard::new(pool.pool.clone()).await.unwrap();
    let guard2 = PostgresTestGuard::new(pool.pool.clone()).await.unwrap();

    assert_ne!(guard1.schema_name(), guard2.schema_name());

    guard1.execute("CREATE TABLE test_table (id INT)").await.unwrap();
    guard2.execute("CREATE TABLE test_table (id INT)").await.unwrap();

    guard1.execute("INSERT INTO test_table VALUES (1)").await.unwrap();
    guard2.execute("INSERT INTO test_table VALUES (2)").await.unwrap();

    use sqlx::Row;
    let rows1 = guard1.fetch_all("SELECT id FROM test_table").await.unwrap();
    let rows2 = guard2.fetch_all("SELECT id FROM test_table").await.unwrap();

    assert_eq!(rows1.len(), 1);
    assert_eq!(rows2.len(), 1);
    assert_eq!(rows1[0].get::<i32, _>("id"), 1);
    assert_eq!(rows2[0].get::<i32, _>("id"), 2);
}

/// Run the catalog store's own idempotent DDL against a real PostgreSQL server,
/// then exercise a `log_acquisition` round trip the same way the sqlite unit tests do.
#[tokio::test]
async fn test_catalog_store_on_postgres() {
    let pool = TestPgPool::new(DbVersion::Postgres16).await.unwrap();
    // Ensures the container and database used below are actually up; the catalog
    // opens its own separate pool against the same server.
    let _ = PostgresTestGuard::new(pool.pool.clone()).await.unwrap();

    let config = TestDbConfig::new(DbVersion::Postgres16);
    let catalog_config = CatalogConfig::from_url(config.postgres_connection_string())
        .unwrap()
        .with_max_connections(2);
    assert_eq!(catalog_config.backend, CatalogBackend::Postgres);

    let store = CatalogStore::open(&catalog_config).await.unwrap();

    let now = chrono::Utc::now().naive_utc();
    let today = chrono::Utc::now().date_naive();
    store
        .insert_log_acquisition(1, today, 10, 5, "sftp://host/a.csv", Some("s3a://landing/a.csv"), RunStatus::Succeeded, None, now)
        .await
        .unwrap();

    let acquired = store.acquired_inbound_locations(10, 5).await.unwrap();
    assert_eq!(acquired, vec!["s3a://landing/a.csv".to_string()]);
}

/// Test config parsing.
#[test]
fn test_config_basics() {
    let config = TestDbConfig::new(DbVersion::Postgres16);
    assert_eq!(config.username, "lakebatch");
    assert_eq!(config.password, "lakebatch_test");
}
