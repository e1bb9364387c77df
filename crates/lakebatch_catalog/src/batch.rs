//! batch_id minting.
//!
//! A batch_id is a monotonic timestamp fingerprint: `YYYYMMDDhhmmss` followed by
//! microsecond precision, with the final digit trimmed. It is assigned exactly once,
//! at the moment a new unit of work is first observed, and travels unchanged through
//! silver and gold.

use chrono::{DateTime, Utc};

/// Mint a fresh batch_id from the given instant.
///
/// Takes an explicit `now` rather than reading the clock itself so callers can use a
/// fixed instant in tests and so two batch_ids minted in the same call tree are
/// guaranteed distinct only when the caller advances the clock between them, matching
/// the "assigned at the moment a new unit of work is first observed" contract.
pub fn mint_batch_id(now: DateTime<Utc>) -> i64 {
    let stamp = now.format("%Y%m%d%H%M%S").to_string();
    let micros = format!("{:06}", now.timestamp_subsec_micros());
    let full = format!("{stamp}{micros}");
    let trimmed = &full[..full.len() - 1];
    trimmed.parse().expect("batch_id fingerprint is always numeric")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn mint_batch_id_trims_one_digit() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::microseconds(123456);
        let id = mint_batch_id(now);
        // YYYYMMDDHHMMSS (14) + micros (6) - 1 trimmed digit = 19 digits.
        assert_eq!(id.to_string().len(), 19);
        assert!(id.to_string().starts_with("20250101000000"));
    }

    #[test]
    fn mint_batch_id_is_monotonic_for_increasing_instants() {
        let a = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let b = a + chrono::Duration::seconds(1);
        assert!(mint_batch_id(b) > mint_batch_id(a));
    }
}
