//! Error taxonomy for the extractor layer. `Display` text for every variant is what
//! gets persisted verbatim as `log_acquisition.exception_details`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unknown source platform: {0}")]
    UnknownPlatform(String),

    #[error("no unprocessed files found for dataset {dataset_id}")]
    NoUnprocessedFiles { dataset_id: i64 },

    #[error("sftp transport error: {0}")]
    Sftp(String),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("database transport error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("jwt signing error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("catalog error: {0}")]
    Catalog(#[from] lakebatch_catalog::CatalogError),

    #[error("core component error: {0}")]
    Core(#[from] lakebatch_core::CoreError),

    #[error("malformed connection_config or workflow step: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
