//! Error types for the catalog layer.

use thiserror::Error;

/// Catalog operation result type.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Catalog errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// SQLx error (connection, query, etc.)
    #[error("catalog database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Serialization error for a JSON-valued catalog column.
    #[error("catalog serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row referenced a control-plane entity that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid connection string or configuration.
    #[error("invalid catalog configuration: {0}")]
    InvalidConfig(String),
}

impl CatalogError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
