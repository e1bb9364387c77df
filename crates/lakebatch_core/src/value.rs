//! The typed cell value every casting/standardization/quality rule operates on.
//!
//! Source rows arrive as strings (from CSV, JSON extraction, or a JDBC-style driver
//! that hands back text); [`CellValue`] is what the Schema Caster converts them into
//! and what every later stage reads and writes. The orchestration engine's frame
//! representation is built directly on this type rather than threading a columnar
//! batch format through every transform step.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bool(bool),
    Date(NaiveDate),
}

impl CellValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Render the value the way it would appear in a standardized string column,
    /// used by standardization rules that operate textually regardless of the
    /// declared semantic type.
    pub fn to_display_string(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::I32(v) => v.to_string(),
            CellValue::I64(v) => v.to_string(),
            CellValue::F32(v) => v.to_string(),
            CellValue::F64(v) => v.to_string(),
            CellValue::Str(v) => v.clone(),
            CellValue::Bool(v) => v.to_string(),
            CellValue::Date(v) => v.format("%Y-%m-%d").to_string(),
        }
    }
}
