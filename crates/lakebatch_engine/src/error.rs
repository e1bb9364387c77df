//! Error taxonomy for the engines layer. Every variant's `Display` text is the
//! string persisted verbatim as a `log_*.exception_details` column.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("DQM check failed for dataset {dataset_id}: {qc_type} crossed criticality threshold {threshold_pct}% (actual {failed_pct}%)")]
    CriticalDqmBreach {
        dataset_id: i64,
        qc_type: String,
        failed_pct: f64,
        threshold_pct: f64,
    },

    #[error("no unprocessed files found for dataset {dataset_id} at stage {stage}")]
    NoUnprocessedFiles { dataset_id: i64, stage: &'static str },

    #[error("unknown transformation kind: {0}")]
    UnknownTransformation(String),

    #[error("catalog error: {0}")]
    Catalog(#[from] lakebatch_catalog::CatalogError),

    #[error("core component error: {0}")]
    Core(#[from] lakebatch_core::CoreError),

    #[error("extract error: {0}")]
    Extract(#[from] lakebatch_extract::ExtractError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("custom sql error: {0}")]
    CustomSql(#[from] duckdb::Error),

    #[error("{0}")]
    Other(String),
}
