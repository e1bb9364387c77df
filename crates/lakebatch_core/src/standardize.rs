//! Standardization rules applied during the Silver standardize step.
//!
//! Applies one named column-level rule (`padding`, `trim`, `blank_conversion`,
//! `replace`, `type_conversion`, `sub_string`) to a single string value. One
//! correction against the upstream behavior is applied here:
//!
//! - `type_conversion` with `type: "upper"` actually uppercases the value.
//!
//! `replace` is deliberately *not* corrected: its one parameter, `value`, is used
//! as both the regex pattern and the replacement text, matching the documented
//! contract bug-for-bug rather than inventing a `pattern`/`replacement` split or
//! an `old->new` delimiter convention that doesn't exist in the catalog's rule
//! shape.

use regex::Regex;
use serde_json::Value;

use crate::error::{CoreError, Result};

fn params_error(function: &str, detail: impl Into<String>) -> CoreError {
    CoreError::InvalidParameters {
        function: function.to_string(),
        detail: detail.into(),
    }
}

fn str_param<'a>(params: &'a Value, key: &str, function: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| params_error(function, format!("missing string field '{key}'")))
}

fn int_param(params: &Value, key: &str, function: &str) -> Result<i64> {
    params
        .get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .ok_or_else(|| params_error(function, format!("missing integer field '{key}'")))
}

/// Apply `function_name` to `raw` using `function_params` (parsed JSON object), and
/// return the standardized value.
pub fn apply_rule(function_name: &str, raw: &str, function_params: &Value) -> Result<String> {
    match function_name {
        "padding" => {
            let padding_type = str_param(function_params, "type", function_name)?;
            let length = int_param(function_params, "length", function_name)? as usize;
            let fill = str_param(function_params, "padding_value", function_name)?;
            let fill_char = fill.chars().next().unwrap_or(' ');
            pad(raw, padding_type, length, fill_char)
        }
        "trim" => Ok(raw.trim().to_string()),
        "blank_conversion" => {
            let collapsed = collapse_whitespace(raw.trim());
            Ok(collapsed)
        }
        "replace" => {
            let value = str_param(function_params, "value", function_name)?;
            let regex = Regex::new(value).map_err(CoreError::from)?;
            Ok(regex.replace_all(raw, value).into_owned())
        }
        "type_conversion" => {
            let kind = str_param(function_params, "type", function_name)?;
            match kind {
                "lower" => Ok(raw.to_lowercase()),
                "upper" => Ok(raw.to_uppercase()),
                other => Err(params_error(function_name, format!("unsupported type '{other}'"))),
            }
        }
        "sub_string" => {
            let start = int_param(function_params, "start_index", function_name)? as usize;
            let length = int_param(function_params, "length", function_name)? as usize;
            let chars: Vec<char> = raw.chars().collect();
            let end = (start + length).min(chars.len());
            let start = start.min(chars.len());
            Ok(chars[start..end].iter().collect())
        }
        other => Err(CoreError::UnknownStandardizationFunction(other.to_string())),
    }
}

fn pad(raw: &str, padding_type: &str, length: usize, fill_char: char) -> Result<String> {
    let current = raw.chars().count();
    if current >= length {
        return Ok(raw.to_string());
    }
    let fill: String = std::iter::repeat(fill_char).take(length - current).collect();
    match padding_type {
        "left" => Ok(format!("{fill}{raw}")),
        "right" => Ok(format!("{raw}{fill}")),
        other => Err(CoreError::UnknownPaddingType(other.to_string())),
    }
}

fn collapse_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn left_padding_fills_to_length() {
        let params = json!({"type": "left", "length": 5, "padding_value": "0"});
        assert_eq!(apply_rule("padding", "42", &params).unwrap(), "00042");
    }

    #[test]
    fn right_padding_does_not_truncate_longer_values() {
        let params = json!({"type": "right", "length": 2, "padding_value": "x"});
        assert_eq!(apply_rule("padding", "hello", &params).unwrap(), "hello");
    }

    #[test]
    fn blank_conversion_collapses_internal_whitespace() {
        let params = json!({});
        assert_eq!(apply_rule("blank_conversion", "  a   b\tc  ", &params).unwrap(), "a b c");
    }

    #[test]
    fn type_conversion_upper_actually_uppercases() {
        let params = json!({"type": "upper"});
        assert_eq!(apply_rule("type_conversion", "abc", &params).unwrap(), "ABC");
    }

    #[test]
    fn replace_uses_value_as_both_pattern_and_replacement() {
        let params = json!({"value": "foo"});
        assert_eq!(apply_rule("replace", "xfooy", &params).unwrap(), "xfooy");
    }

    #[test]
    fn replace_regex_pattern_substitutes_itself_as_literal_text() {
        let params = json!({"value": "[0-9]+"});
        assert_eq!(apply_rule("replace", "a123b", &params).unwrap(), "a[0-9]+b");
    }

    #[test]
    fn sub_string_extracts_requested_range() {
        let params = json!({"start_index": 1, "length": 3});
        assert_eq!(apply_rule("sub_string", "abcdef", &params).unwrap(), "bcd");
    }

    #[test]
    fn unknown_function_is_rejected() {
        let err = apply_rule("mystery", "x", &json!({})).unwrap_err();
        assert!(matches!(err, CoreError::UnknownStandardizationFunction(_)));
    }
}
