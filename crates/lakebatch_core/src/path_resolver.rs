//! Path Resolver.
//!
//! `resolve(location, env)` splits a logical location on `/`, prepends `{env}-` to the
//! first segment to form the bucket, and joins the rest for the key. Every read and
//! write of external data goes through this one function so environment isolation is
//! a single source of truth.

/// A resolved object-store location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub bucket: String,
    pub key: String,
    pub uri: String,
}

/// Resolve a logical `bucket/key...` location against an environment tag.
pub fn resolve(location: &str, env: &str) -> ResolvedLocation {
    let mut segments = location.trim_matches('/').split('/');
    let first = segments.next().unwrap_or_default();
    let bucket = format!("{env}-{first}");
    let key: String = segments.collect::<Vec<_>>().join("/");
    let uri = format!("s3a://{bucket}/{key}");
    ResolvedLocation { bucket, key, uri }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_first_segment_as_bucket() {
        let resolved = resolve("sales/raw/2025", "prod");
        assert_eq!(resolved.bucket, "prod-sales");
        assert_eq!(resolved.key, "raw/2025");
        assert_eq!(resolved.uri, "s3a://prod-sales/raw/2025");
    }

    #[test]
    fn single_segment_location_has_empty_key() {
        let resolved = resolve("sales", "dev");
        assert_eq!(resolved.bucket, "dev-sales");
        assert_eq!(resolved.key, "");
        assert_eq!(resolved.uri, "s3a://dev-sales/");
    }

    #[test]
    fn tolerates_leading_and_trailing_slashes() {
        let resolved = resolve("/sales/raw/", "prod");
        assert_eq!(resolved.bucket, "prod-sales");
        assert_eq!(resolved.key, "raw");
    }
}
