//! Data Quality Measure rules applied at the Silver quality gate.
//!
//! Each `*_check` function evaluates one `ctl_dqm_master_dtl` rule against a column
//! of standardized string values and returns a pass/fail mask, one entry per row.
//! [`classify`] turns a failure count into the pass/warn/fail verdict the quality
//! gate acts on, given the rule's criticality and threshold.
//!
//! `decimal_check` uses a decimal-shaped regex (`^-?\d+(\.\d+)?$`), not the plain
//! integer regex the upstream implementation reused for both rule types.

use std::collections::HashSet;

use regex::Regex;

use crate::date_formats::regex_for_format;
use crate::error::{CoreError, Result};
use crate::value::CellValue;

const INTEGER_REGEX: &str = r"^-?\d+$";
const DECIMAL_REGEX: &str = r"^-?\d+(\.\d+)?$";

/// Result of classifying a rule's failure count against its criticality threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No failures at all.
    Passed,
    /// Some failures, but either non-critical or within threshold: keep passing rows.
    PassedWithFailures,
    /// Critical and over threshold: the batch must stop.
    Failed,
}

/// Classify a rule outcome. `critical` is `true` for criticality `"C"`, `false` for
/// `"NC"`. `threshold_pct` is compared against `failure_count / total_count * 100`.
pub fn classify(total_count: usize, failure_count: usize, critical: bool, threshold_pct: f64) -> (Verdict, f64) {
    if failure_count == 0 {
        return (Verdict::Passed, 0.0);
    }
    let failure_pct = (failure_count as f64 / total_count as f64) * 100.0;
    if critical && failure_pct >= threshold_pct {
        (Verdict::Failed, failure_pct)
    } else {
        (Verdict::PassedWithFailures, failure_pct)
    }
}

pub fn null_check(values: &[CellValue]) -> Vec<bool> {
    values.iter().map(|v| !v.is_null()).collect()
}

/// Pass the first occurrence of each distinct key; every later duplicate fails,
/// matching `DataFrame.unique()`'s keep-first behavior. `column_name` may name a
/// composite key (`"id,region"`), so each row's key is the tuple of every named
/// column's value, not a single column's.
pub fn unique_check(keys: &[Vec<String>]) -> Vec<bool> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.iter().map(|k| seen.insert(k.clone())).collect()
}

pub fn length_check(values: &[String], expression: &str, expected: i64) -> Result<Vec<bool>> {
    let cmp: fn(i64, i64) -> bool = match expression {
        ">" => |a, b| a > b,
        "<" => |a, b| a < b,
        ">=" => |a, b| a >= b,
        "<=" => |a, b| a <= b,
        "==" | "=" => |a, b| a == b,
        "!=" | "<>" => |a, b| a != b,
        other => {
            return Err(CoreError::InvalidParameters {
                function: "length".to_string(),
                detail: format!("unsupported comparison expression '{other}'"),
            })
        }
    };
    Ok(values
        .iter()
        .map(|v| cmp(v.chars().count() as i64, expected))
        .collect())
}

pub fn date_check(values: &[String], format_tag: &str) -> Result<Vec<bool>> {
    let regex = Regex::new(regex_for_format(format_tag)).map_err(CoreError::from)?;
    Ok(values.iter().map(|v| regex.is_match(v)).collect())
}

pub fn integer_check(values: &[String]) -> Vec<bool> {
    let regex = Regex::new(INTEGER_REGEX).expect("static integer regex is valid");
    values.iter().map(|v| regex.is_match(v)).collect()
}

pub fn decimal_check(values: &[String]) -> Vec<bool> {
    let regex = Regex::new(DECIMAL_REGEX).expect("static decimal regex is valid");
    values.iter().map(|v| regex.is_match(v)).collect()
}

pub fn domain_check(values: &[String], allowed_csv: &str) -> Vec<bool> {
    let allowed: HashSet<&str> = allowed_csv.split(',').map(str::trim).collect();
    values.iter().map(|v| allowed.contains(v.as_str())).collect()
}

/// A free-form rule expressed as a regex against the column's string value.
pub fn custom_check(values: &[String], pattern: &str) -> Result<Vec<bool>> {
    let regex = Regex::new(pattern).map_err(CoreError::from)?;
    Ok(values.iter().map(|v| regex.is_match(v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_check_flags_only_null_cells() {
        let values = vec![CellValue::Str("a".into()), CellValue::Null, CellValue::I32(1)];
        assert_eq!(null_check(&values), vec![true, false, true]);
    }

    #[test]
    fn unique_check_keeps_first_occurrence_only() {
        let keys = vec![vec!["a".to_string()], vec!["b".to_string()], vec!["a".to_string()]];
        assert_eq!(unique_check(&keys), vec![true, true, false]);
    }

    #[test]
    fn unique_check_dedupes_on_the_composite_key_tuple() {
        let keys = vec![
            vec!["1".to_string(), "IN".to_string()],
            vec!["1".to_string(), "US".to_string()],
            vec!["1".to_string(), "IN".to_string()],
        ];
        assert_eq!(unique_check(&keys), vec![true, true, false]);
    }

    #[test]
    fn decimal_check_rejects_a_bare_leading_dot() {
        let values = vec![".5".to_string(), "0.5".to_string()];
        assert_eq!(decimal_check(&values), vec![false, true]);
    }

    #[test]
    fn length_check_supports_comparison_operators() {
        let values = vec!["ab".to_string(), "abcd".to_string()];
        assert_eq!(length_check(&values, ">", 2).unwrap(), vec![false, true]);
        assert_eq!(length_check(&values, "==", 2).unwrap(), vec![true, false]);
    }

    #[test]
    fn decimal_check_accepts_fractional_values_unlike_integer_check() {
        let values = vec!["12.5".to_string(), "-3".to_string(), "abc".to_string()];
        assert_eq!(decimal_check(&values), vec![true, true, false]);
        assert_eq!(integer_check(&values), vec![false, true, false]);
    }

    #[test]
    fn domain_check_matches_trimmed_allowed_list() {
        let values = vec!["red".to_string(), "teal".to_string()];
        assert_eq!(domain_check(&values, "red, green, blue"), vec![true, false]);
    }

    #[test]
    fn classify_passes_non_critical_rules_regardless_of_threshold() {
        let (verdict, pct) = classify(10, 8, false, 5.0);
        assert_eq!(verdict, Verdict::PassedWithFailures);
        assert_eq!(pct, 80.0);
    }

    #[test]
    fn classify_fails_critical_rules_over_threshold() {
        let (verdict, _) = classify(10, 6, true, 50.0);
        assert_eq!(verdict, Verdict::Failed);
    }

    #[test]
    fn classify_passes_critical_rules_under_threshold() {
        let (verdict, _) = classify(100, 2, true, 50.0);
        assert_eq!(verdict, Verdict::PassedWithFailures);
    }
}
