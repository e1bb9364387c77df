//! Pattern Matcher: validates and matches inbound file-name patterns.
//!
//! Validates file names against patterns containing date tokens (`YYYYMMDD`,
//! `YYYYMM`, `YYYY`) and `*` wildcards, or against a raw regular expression when a
//! row flags the pattern as "static" (`outbound_source_file_pattern_static = Y`).
//!
//! Token priority is longest-first: `YYYYMMDD` is checked before `YYYYMM` before
//! `YYYY`, so a longer token is never mis-split into two shorter ones.

use regex::Regex;

use crate::error::{CoreError, Result};

pub(crate) const TOKENS: &[(&str, &str)] = &[
    ("YYYYMMDD", r"\d{8}"),
    ("YYYYMM", r"\d{6}"),
    ("YYYY", r"\d{4}"),
];

/// Build the regex a non-static pattern compiles to.
fn pattern_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let rest = &pattern[i..];
        if let Some((token, repl)) = TOKENS.iter().find(|(tok, _)| rest.starts_with(tok)) {
            regex.push_str(repl);
            i += token.len();
            continue;
        }
        if rest.starts_with('*') {
            regex.push_str(".*");
            i += 1;
            continue;
        }
        let ch = rest.chars().next().unwrap();
        regex.push_str(&regex::escape(&ch.to_string()));
        i += ch.len_utf8();
    }
    regex.push('$');
    regex
}

/// Validate `file_name` against `file_pattern`. When `custom` is true, `file_pattern`
/// is compiled directly as a regular expression; otherwise it is expanded through the
/// date-token/wildcard grammar first.
pub fn validate_pattern(file_pattern: &str, file_name: &str, custom: bool) -> Result<bool> {
    let regex_src = if custom {
        file_pattern.to_string()
    } else {
        pattern_to_regex(file_pattern)
    };
    let regex = Regex::new(&regex_src).map_err(CoreError::from)?;
    Ok(regex.is_match(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name_renderer::render;
    use chrono::NaiveDate;

    #[test]
    fn matches_full_date_token() {
        assert!(validate_pattern("sales_YYYYMMDD.csv", "sales_20250101.csv", false).unwrap());
        assert!(!validate_pattern("sales_YYYYMMDD.csv", "sales_2025.csv", false).unwrap());
    }

    #[test]
    fn longer_token_wins_over_shorter_prefix() {
        // YYYYMMDD must not be parsed as YYYY + MM + DD-shaped literal text.
        let regex = pattern_to_regex("f_YYYYMMDD");
        assert_eq!(regex, r"^f_\d{8}$");
    }

    #[test]
    fn wildcard_matches_anything() {
        assert!(validate_pattern("sales_*.csv", "sales_anything_here.csv", false).unwrap());
    }

    #[test]
    fn static_pattern_is_compiled_as_raw_regex() {
        assert!(validate_pattern(r"^sales_\d{4}\.csv$", "sales_2025.csv", true).unwrap());
    }

    #[test]
    fn render_then_validate_round_trips() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        for pattern in ["sales_YYYYMMDD.csv", "report_YYYYMM_*.txt", "YYYY_archive.csv"] {
            let rendered = render(pattern, today);
            assert!(
                validate_pattern(pattern, &rendered, false).unwrap(),
                "pattern {pattern} should validate its own rendering {rendered}"
            );
        }
    }
}
