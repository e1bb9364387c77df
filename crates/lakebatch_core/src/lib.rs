//! Stateless transform components shared by the Bronze/Silver/Gold engines:
//! path resolution, file-pattern matching and rendering, JSON-path mapping, schema
//! casting, column standardization, and quality rules.

pub mod date_formats;
pub mod dqm;
pub mod error;
pub mod json_mapper;
pub mod name_renderer;
pub mod pattern_matcher;
pub mod path_resolver;
pub mod schema_caster;
pub mod standardize;
pub mod value;

pub use error::{CoreError, Result};
pub use value::CellValue;
