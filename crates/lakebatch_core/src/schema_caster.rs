//! Schema Caster: rename→cast step of the Silver Engine.
//!
//! Casts a column of raw strings into a typed [`CellValue`] column according to the
//! semantic type declared on `ctl_dataset_column`. `date` additionally requires a
//! format string, validated through [`crate::date_formats`].

use chrono::NaiveDate;

use crate::error::{CoreError, Result};
use crate::value::CellValue;

/// Cast a single raw field to the semantic type named in `data_type`.
///
/// `date_format` must be `Some` when `data_type == "date"`; it is the `chrono`
/// strftime-style format the source value is parsed with.
pub fn cast_field(column: &str, raw: &str, data_type: &str, date_format: Option<&str>) -> Result<CellValue> {
    if raw.is_empty() {
        return Ok(CellValue::Null);
    }
    let fail = |detail: String| CoreError::CastFailure {
        column: column.to_string(),
        detail,
    };
    match data_type {
        "integer" => raw
            .parse::<i32>()
            .map(CellValue::I32)
            .map_err(|e| fail(e.to_string())),
        "long" => raw
            .parse::<i64>()
            .map(CellValue::I64)
            .map_err(|e| fail(e.to_string())),
        "float" => raw
            .parse::<f32>()
            .map(CellValue::F32)
            .map_err(|e| fail(e.to_string())),
        "double" => raw
            .parse::<f64>()
            .map(CellValue::F64)
            .map_err(|e| fail(e.to_string())),
        "string" => Ok(CellValue::Str(raw.to_string())),
        "boolean" => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "y" | "yes" => Ok(CellValue::Bool(true)),
            "false" | "0" | "n" | "no" => Ok(CellValue::Bool(false)),
            other => Err(fail(format!("'{other}' is not a recognized boolean literal"))),
        },
        "date" => {
            let format = date_format.ok_or_else(|| {
                fail("column_data_type is 'date' but no column_date_format was configured".to_string())
            })?;
            NaiveDate::parse_from_str(raw, format)
                .map(CellValue::Date)
                .map_err(|e| fail(e.to_string()))
        }
        other => Err(CoreError::UnknownType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_each_numeric_type() {
        assert_eq!(cast_field("c", "42", "integer", None).unwrap(), CellValue::I32(42));
        assert_eq!(cast_field("c", "42", "long", None).unwrap(), CellValue::I64(42));
        assert_eq!(cast_field("c", "4.5", "float", None).unwrap(), CellValue::F32(4.5));
        assert_eq!(cast_field("c", "4.5", "double", None).unwrap(), CellValue::F64(4.5));
    }

    #[test]
    fn empty_raw_value_casts_to_null_regardless_of_type() {
        assert_eq!(cast_field("c", "", "integer", None).unwrap(), CellValue::Null);
        assert_eq!(cast_field("c", "", "date", Some("%Y-%m-%d")).unwrap(), CellValue::Null);
    }

    #[test]
    fn date_requires_a_format_string() {
        let err = cast_field("c", "2025-01-01", "date", None).unwrap_err();
        assert!(matches!(err, CoreError::CastFailure { .. }));
    }

    #[test]
    fn date_parses_with_supplied_format() {
        let value = cast_field("c", "20250101", "date", Some("%Y%m%d")).unwrap();
        assert_eq!(value, CellValue::Date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    }

    #[test]
    fn unknown_data_type_is_rejected() {
        let err = cast_field("c", "x", "map", None).unwrap_err();
        assert!(matches!(err, CoreError::UnknownType(_)));
    }
}
