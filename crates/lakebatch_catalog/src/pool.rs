//! Catalog connection pool.
//!
//! Unlike `sqlx::AnyPool`, we use a concrete pool type per compiled backend so
//! `#[derive(FromRow)]` works with the chrono/date types the catalog tables need.
//!
//! - `postgres` feature: uses `PgPool`.
//! - `sqlite` feature (default): uses `SqlitePool`.
//!
//! If both are enabled, `postgres` takes priority, matching a production deployment
//! where SQLite is the local/dev fallback.

use crate::error::{CatalogError, Result};

/// Catalog pool type alias, selected at compile time by feature flag.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type CatalogPool = sqlx::PgPool;

#[cfg(feature = "sqlite")]
pub type CatalogPool = sqlx::SqlitePool;

/// Database backend named by a `database_url` scheme, per the connection-string
/// derivation (`database_type ∈ {mysql, postgresql, sqlite}` collapses here to the
/// two backends sqlx is compiled with; `mysql` is not carried forward as a control-plane
/// backend since neither example in this workspace uses it and the catalog's read/write
/// pattern is simple enough that sqlite/postgres cover every deployment this engine targets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogBackend {
    Sqlite,
    Postgres,
}

impl CatalogBackend {
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("sqlite:") {
            return Some(Self::Sqlite);
        }
        if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            return Some(Self::Postgres);
        }
        None
    }
}

/// Catalog connection configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub url: String,
    pub backend: CatalogBackend,
    pub max_connections: u32,
}

impl CatalogConfig {
    /// Build configuration from a `database_url`, auto-detecting the backend.
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let backend = CatalogBackend::from_url(&url)
            .ok_or_else(|| CatalogError::invalid_config(format!("unrecognized database_url scheme: {url}")))?;
        Ok(Self {
            url,
            backend,
            max_connections: match backend {
                CatalogBackend::Sqlite => 5,
                CatalogBackend::Postgres => 10,
            },
        })
    }

    /// Build configuration from the decomposed `db_*` environment set.
    pub fn from_parts(
        backend: CatalogBackend,
        host: &str,
        port: Option<u16>,
        user: &str,
        password: &str,
        database: &str,
    ) -> Self {
        let url = match backend {
            CatalogBackend::Postgres => {
                let port = port.unwrap_or(5432);
                format!("postgresql://{user}:{password}@{host}:{port}/{database}")
            }
            CatalogBackend::Sqlite => format!("sqlite:{database}?mode=rwc"),
        };
        Self {
            max_connections: match backend {
                CatalogBackend::Sqlite => 5,
                CatalogBackend::Postgres => 10,
            },
            url,
            backend,
        }
    }

    pub fn sqlite_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            backend: CatalogBackend::Sqlite,
            max_connections: 1,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Create a catalog pool from configuration, applying backend-specific tuning.
pub async fn create_pool(config: &CatalogConfig) -> Result<CatalogPool> {
    #[cfg(feature = "sqlite")]
    {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        apply_sqlite_optimizations(&pool).await?;
        tracing::info!(backend = ?config.backend, "catalog pool connected");
        return Ok(pool);
    }

    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        tracing::info!(backend = ?config.backend, "catalog pool connected");
        return Ok(pool);
    }

    #[allow(unreachable_code)]
    Err(CatalogError::invalid_config(
        "no catalog backend feature compiled in (enable `sqlite` or `postgres`)",
    ))
}

#[cfg(feature = "sqlite")]
async fn apply_sqlite_optimizations(pool: &CatalogPool) -> Result<()> {
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    sqlx::query("PRAGMA synchronous=NORMAL").execute(pool).await?;
    sqlx::query("PRAGMA foreign_keys=ON").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_memory_pool_connects() {
        let config = CatalogConfig::sqlite_memory();
        let pool = create_pool(&config).await;
        assert!(pool.is_ok());
    }

    #[test]
    fn from_url_rejects_unknown_scheme() {
        let err = CatalogConfig::from_url("mongodb://localhost/x").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidConfig(_)));
    }
}
