//! Shared state every extractor needs: environment tag, already-processed file
//! locations (the dedupe set), the HTTP client, and the object-store client.

use std::collections::HashSet;

/// The set of `inbound_file_location` values already recorded for a dataset, used
/// to skip files the acquisition step has already landed.
#[derive(Debug, Default, Clone)]
pub struct Deduper {
    seen: HashSet<String>,
}

impl Deduper {
    pub fn from_known(seen: impl IntoIterator<Item = String>) -> Self {
        Self {
            seen: seen.into_iter().collect(),
        }
    }

    pub fn is_new(&self, location: &str) -> bool {
        !self.seen.contains(location)
    }

    pub fn mark_seen(&mut self, location: String) {
        self.seen.insert(location);
    }
}

/// Object-store credentials, kept unparsed until a call needs a bucket-scoped
/// client, since a resolved location's bucket name varies per dataset/env.
#[derive(Debug, Clone)]
pub struct ObjectStoreCredentials {
    pub aws_key: String,
    pub aws_secret: String,
    pub aws_endpoint: String,
}

/// Environment-scoped clients every extractor shares.
#[derive(Clone)]
pub struct ExtractionContext {
    pub env: String,
    pub http: reqwest::Client,
    pub object_store_credentials: ObjectStoreCredentials,
}

impl ExtractionContext {
    pub fn new(env: impl Into<String>, object_store_credentials: ObjectStoreCredentials) -> Self {
        Self {
            env: env.into(),
            http: reqwest::Client::new(),
            object_store_credentials,
        }
    }
}
