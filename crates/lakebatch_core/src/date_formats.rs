//! Date-format tag → regex table used by the quality gate's `date` rule.
//!
//! Unrecognized tags fall through to [`DEFAULT_DATE_REGEX`] rather than matching
//! nothing, correcting the upstream behavior noted in the design notes.

/// Regex for the fallback/default date shape, `YYYY-MM-DD`.
pub const DEFAULT_DATE_REGEX: &str = r"^\d{4}-\d{2}-\d{2}$";

/// Resolve a date-format tag to its validation regex, or [`DEFAULT_DATE_REGEX`] if the
/// tag is not one of the known ones.
pub fn regex_for_format(format_tag: &str) -> &'static str {
    match format_tag {
        "YYYY-MM-DD" => r"^\d{4}-\d{2}-\d{2}$",
        "YYYYMMDD" => r"^\d{8}$",
        "MM/DD/YYYY" => r"^\d{2}/\d{2}/\d{4}$",
        "DD-MM-YYYY" => r"^\d{2}-\d{2}-\d{4}$",
        _ => DEFAULT_DATE_REGEX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_return_their_own_regex() {
        assert_eq!(regex_for_format("YYYYMMDD"), r"^\d{8}$");
    }

    #[test]
    fn unknown_tag_falls_back_to_default_instead_of_none() {
        assert_eq!(regex_for_format("banana"), DEFAULT_DATE_REGEX);
    }
}
