//! Shared error type for the path/pattern/mapping/casting/rule components.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown semantic type: {0}")]
    UnknownType(String),

    #[error("unknown standardization function: {0}")]
    UnknownStandardizationFunction(String),

    #[error("unknown padding type: {0}")]
    UnknownPaddingType(String),

    #[error("invalid standardization parameters for {function}: {detail}")]
    InvalidParameters { function: String, detail: String },

    #[error("cast failure on column {column}: {detail}")]
    CastFailure { column: String, detail: String },

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
