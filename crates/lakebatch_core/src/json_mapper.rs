//! JSON Path Mapper: a pre-step for JSON-sourced datasets.
//!
//! Extracts one value list per output column from a JSON document using a small
//! dot/bracket path grammar (`person.name`, `items[0].sku`, `items[*].sku`), then
//! aligns the per-column lists positionally into rows. A column whose list is
//! shorter than the longest repeats its last value to fill the remaining rows,
//! mirroring the "ragged column" behavior the upstream mapper relies on.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    for raw in path.split('.') {
        let mut rest = raw;
        while let Some(open) = rest.find('[') {
            let key = &rest[..open];
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            let close = rest[open..]
                .find(']')
                .map(|p| open + p)
                .ok_or_else(|| CoreError::InvalidPattern(format!("unterminated '[' in {path}")))?;
            let inside = &rest[open + 1..close];
            if inside == "*" {
                segments.push(Segment::Wildcard);
            } else {
                let idx: usize = inside
                    .parse()
                    .map_err(|_| CoreError::InvalidPattern(format!("bad index '{inside}' in {path}")))?;
                segments.push(Segment::Index(idx));
            }
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Key(rest.to_string()));
        }
    }
    Ok(segments)
}

fn walk(value: &Value, segments: &[Segment], out: &mut Vec<Value>) {
    let Some((head, tail)) = segments.split_first() else {
        out.push(value.clone());
        return;
    };
    match head {
        Segment::Key(key) => {
            if let Some(next) = value.get(key) {
                walk(next, tail, out);
            }
        }
        Segment::Index(idx) => {
            if let Some(next) = value.get(idx) {
                walk(next, tail, out);
            }
        }
        Segment::Wildcard => {
            if let Some(array) = value.as_array() {
                for item in array {
                    walk(item, tail, out);
                }
            }
        }
    }
}

/// Find every value `path` selects within `json_data`.
pub fn find(json_data: &Value, path: &str) -> Result<Vec<Value>> {
    let segments = parse_path(path)?;
    let mut out = Vec::new();
    walk(json_data, &segments, &mut out);
    Ok(out)
}

/// Extract all mapped columns from `json_data` and align them into rows.
///
/// `mapping` is ordered `(output_column, json_path)` pairs; order is preserved in
/// each returned row's key set only incidentally (rows are plain maps), but the
/// extraction itself follows `mapping`'s iteration order.
pub fn map_rows(mapping: &[(String, String)], json_data: &Value) -> Result<Vec<HashMap<String, Value>>> {
    let mut columns: Vec<(&str, Vec<Value>)> = Vec::with_capacity(mapping.len());
    for (column, path) in mapping {
        columns.push((column.as_str(), find(json_data, path)?));
    }

    let max_len = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    let mut rows = Vec::with_capacity(max_len);
    for i in 0..max_len {
        let mut row = HashMap::with_capacity(columns.len());
        for (column, values) in &columns {
            let value = values
                .get(i)
                .or_else(|| values.last())
                .cloned()
                .unwrap_or(Value::Null);
            row.insert((*column).to_string(), coerce_numeric_strings(value));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// A JSON string that parses cleanly as an integer is coerced to a number, matching
/// the upstream mapper's best-effort `int(value)` fallback.
fn coerce_numeric_strings(value: Value) -> Value {
    if let Value::String(s) = &value {
        if let Ok(n) = s.parse::<i64>() {
            return Value::from(n);
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dot_path_finds_nested_scalar() {
        let data = json!({"person": {"name": "Alice", "age": "30"}});
        let found = find(&data, "person.name").unwrap();
        assert_eq!(found, vec![json!("Alice")]);
    }

    #[test]
    fn wildcard_collects_every_array_element() {
        let data = json!({"items": [{"sku": "A1"}, {"sku": "A2"}, {"sku": "A3"}]});
        let found = find(&data, "items[*].sku").unwrap();
        assert_eq!(found, vec![json!("A1"), json!("A2"), json!("A3")]);
    }

    #[test]
    fn short_column_repeats_its_last_value() {
        let data = json!({"name": ["Alice", "Bob"], "age": ["30"]});
        let mapping = vec![
            ("name".to_string(), "name[*]".to_string()),
            ("age".to_string(), "age[*]".to_string()),
        ];
        let rows = map_rows(&mapping, &data).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["age"], json!(30));
        assert_eq!(rows[1]["age"], json!(30));
        assert_eq!(rows[1]["name"], json!("Bob"));
    }

    #[test]
    fn numeric_strings_are_coerced_to_integers() {
        let data = json!({"age": ["30"]});
        let mapping = vec![("age".to_string(), "age[*]".to_string())];
        let rows = map_rows(&mapping, &data).unwrap();
        assert_eq!(rows[0]["age"], json!(30));
    }
}
