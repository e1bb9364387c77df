//! Name Renderer: outbound file-name generation.
//!
//! Expands the same date tokens the Pattern Matcher recognizes (`YYYYMMDD`,
//! `YYYYMM`, `YYYY`) against a concrete date, and passes `*` through unchanged since
//! a wildcard has no value to render. Used for both outbound SaaS/API file naming and
//! for generating the silver/gold snapshot partition key.

use chrono::NaiveDate;

use crate::pattern_matcher::TOKENS;

/// Render `pattern`'s date tokens against `on_date`, leaving any `*` wildcard as-is.
pub fn render(pattern: &str, on_date: NaiveDate) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < pattern.len() {
        let rest = &pattern[i..];
        if let Some((token, _)) = TOKENS.iter().find(|(tok, _)| rest.starts_with(tok)) {
            out.push_str(&render_token(token, on_date));
            i += token.len();
            continue;
        }
        let ch = rest.chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn render_token(token: &str, on_date: NaiveDate) -> String {
    match token {
        "YYYYMMDD" => on_date.format("%Y%m%d").to_string(),
        "YYYYMM" => on_date.format("%Y%m").to_string(),
        "YYYY" => on_date.format("%Y").to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_full_date_token() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(render("sales_YYYYMMDD.csv", date), "sales_20250314.csv");
    }

    #[test]
    fn renders_month_and_year_tokens() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(render("report_YYYYMM.txt", date), "report_202503.txt");
        assert_eq!(render("archive_YYYY.zip", date), "archive_2025.zip");
    }

    #[test]
    fn leaves_wildcard_and_literal_text_untouched() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(render("sales_*_YYYY.csv", date), "sales_*_2025.csv");
    }
}
