//! Object-store acquisition.
//!
//! Lists the remote prefix, matches candidates against the dataset's file pattern,
//! stream-copies each new match into the inbound zone, and writes one
//! `log_acquisition` row per attempt.

use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;

use lakebatch_core::{path_resolver, pattern_matcher};

use crate::context::{Deduper, ExtractionContext};
use crate::error::{ExtractError, Result};

/// One file copied from the source location into the inbound zone.
pub struct AcquiredFile {
    pub source_file: String,
    pub inbound_location: String,
    pub byte_count: u64,
}

fn bucket_client(creds: &crate::context::ObjectStoreCredentials, bucket: &str) -> Result<Box<dyn ObjectStore>> {
    let store = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_access_key_id(&creds.aws_key)
        .with_secret_access_key(&creds.aws_secret)
        .with_endpoint(&creds.aws_endpoint)
        .with_allow_http(true)
        .build()?;
    Ok(Box::new(store))
}

/// Acquire every new, pattern-matching object under `source_location`, landing each
/// into `inbound_location`. Returns an error if zero candidates match.
pub async fn acquire(
    ctx: &ExtractionContext,
    source_location: &str,
    inbound_location: &str,
    file_pattern: &str,
    pattern_is_static: bool,
    deduper: &mut Deduper,
) -> Result<Vec<AcquiredFile>> {
    let source = path_resolver::resolve(source_location, &ctx.env);
    let inbound = path_resolver::resolve(inbound_location, &ctx.env);

    let source_store = bucket_client(&ctx.object_store_credentials, &source.bucket)?;
    let inbound_store = bucket_client(&ctx.object_store_credentials, &inbound.bucket)?;

    let prefix = ObjectPath::from(source.key.as_str());
    let mut listing = source_store.list(Some(&prefix));

    let mut acquired = Vec::new();
    use futures::StreamExt;
    while let Some(meta) = listing.next().await.transpose()? {
        let basename = meta
            .location
            .filename()
            .ok_or_else(|| ExtractError::InvalidConfig(format!("object has no filename: {}", meta.location)))?
            .to_string();

        if !pattern_matcher::validate_pattern(file_pattern, &basename, pattern_is_static)? {
            continue;
        }

        let target_key = format!("{}/{}", inbound.key.trim_end_matches('/'), basename);
        let target_location = format!("{}-{inbound_location}/{basename}", ctx.env);
        if !deduper.is_new(&target_location) {
            continue;
        }

        let bytes = source_store.get(&meta.location).await?.bytes().await?;
        let byte_count = bytes.len() as u64;
        inbound_store.put(&ObjectPath::from(target_key.as_str()), bytes.into()).await?;

        deduper.mark_seen(target_location.clone());
        acquired.push(AcquiredFile {
            source_file: basename,
            inbound_location: target_location,
            byte_count,
        });
    }

    if acquired.is_empty() {
        return Err(ExtractError::InvalidConfig(
            "No unprocessed files are found.".to_string(),
        ));
    }
    Ok(acquired)
}

/// Write a single text payload into the inbound zone under `basename`, the shape the
/// DATABASE/API/SAAS branches use to land their synthesized CSV/TXT object.
pub async fn put_inbound_object(
    ctx: &ExtractionContext,
    inbound_location: &str,
    basename: &str,
    contents: String,
) -> Result<AcquiredFile> {
    let inbound = path_resolver::resolve(inbound_location, &ctx.env);
    let inbound_store = bucket_client(&ctx.object_store_credentials, &inbound.bucket)?;
    let target_key = format!("{}/{}", inbound.key.trim_end_matches('/'), basename);
    let target_location = format!("{}-{inbound_location}/{basename}", ctx.env);

    let byte_count = contents.len() as u64;
    inbound_store
        .put(&ObjectPath::from(target_key.as_str()), contents.into_bytes().into())
        .await?;

    Ok(AcquiredFile {
        source_file: basename.to_string(),
        inbound_location: target_location,
        byte_count,
    })
}

/// List every object under `inbound_location` not already in `exclude`, matching
/// `file_pattern`, and read its contents back as UTF-8 text — the B2 "read the
/// CSV/TXT" step.
pub async fn list_and_read_inbound(
    ctx: &ExtractionContext,
    inbound_location: &str,
    file_pattern: &str,
    pattern_is_static: bool,
    exclude: &std::collections::HashSet<String>,
) -> Result<Vec<(AcquiredFile, String)>> {
    let inbound = path_resolver::resolve(inbound_location, &ctx.env);
    let inbound_store = bucket_client(&ctx.object_store_credentials, &inbound.bucket)?;

    let prefix = ObjectPath::from(inbound.key.as_str());
    let mut listing = inbound_store.list(Some(&prefix));

    let mut found = Vec::new();
    use futures::StreamExt;
    while let Some(meta) = listing.next().await.transpose()? {
        let basename = match meta.location.filename() {
            Some(name) => name.to_string(),
            None => continue,
        };
        if !pattern_matcher::validate_pattern(file_pattern, &basename, pattern_is_static)? {
            continue;
        }
        let target_location = format!("{}-{inbound_location}/{basename}", ctx.env);
        if exclude.contains(&target_location) {
            continue;
        }

        let bytes = inbound_store.get(&meta.location).await?.bytes().await?;
        let byte_count = bytes.len() as u64;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        found.push((
            AcquiredFile {
                source_file: basename,
                inbound_location: target_location,
                byte_count,
            },
            text,
        ));
    }
    Ok(found)
}
