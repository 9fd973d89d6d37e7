//! Virtual file system over an object store.
//!
//! # Data Flow
//! ```text
//! request path
//!     → path.rs (percent-decode, clean, join onto the site prefix)
//!     → site root?            → directory handle, no store call
//!     → has_prefix("<key>/")  → directory handle
//!     → fallback chain        → first candidate that stats and fetches
//!     → NotExist
//! ```
//!
//! Fallback chains:
//! - single-page app: `<key>`, `<prefix>/index.html`, not-found page
//! - multi-page site: `<key>`, `<key>/index.html`, `<key>/index.htm`, not-found page
//!
//! # Design Decisions
//! - Store errors never escape `open`; they are logged and the candidate is skipped
//! - Each candidate is stat'ed before it is fetched, so losers cost one HEAD
//! - `open` is cancel-safe: dropping the future stops the chain

pub mod handle;
pub mod path;

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::config::SiteConfig;
use crate::observability::metrics;
use crate::store::{DirEntry, ObjectStore, StoreError};

pub use handle::{Resolution, Resource, ResourceHandle};
pub use path::DecodeError;

/// How much of the winning candidate `open_with` retrieves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// Stat and fetch: the handle carries a readable stream.
    Content,
    /// Stat only, for HEAD requests. The handle has no stream.
    Metadata,
}

/// Why `open` produced no handle.
#[derive(Debug, Error)]
pub enum OpenError {
    /// The path could not be decoded. No store call was made.
    #[error("bad request path: {0}")]
    BadRequest(#[from] DecodeError),

    /// Nothing in the applicable chain could be served.
    #[error("resource does not exist")]
    NotExist,
}

/// One site's view of the bucket.
#[derive(Debug)]
pub struct VirtualFileSystem {
    name: String,
    bucket: String,
    prefix: String,
    spa: bool,
    browse: bool,
    not_found_key: Option<String>,
    store: Arc<dyn ObjectStore>,
}

impl VirtualFileSystem {
    /// Build the file system for `site`. `name` labels logs and metrics.
    pub fn new(
        name: impl Into<String>,
        site: &SiteConfig,
        default_bucket: &str,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let not_found_key = Some(path::clean(&site.not_found_page)).filter(|k| !k.is_empty());
        Self {
            name: name.into(),
            bucket: site
                .bucket
                .clone()
                .unwrap_or_else(|| default_bucket.to_string()),
            prefix: path::clean(&site.path_prefix),
            spa: site.spa,
            browse: site.browse,
            not_found_key,
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Cleaned key prefix, without leading or trailing `/`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_spa(&self) -> bool {
        self.spa
    }

    pub fn browse(&self) -> bool {
        self.browse
    }

    /// Resolve a raw (still percent-encoded) request path.
    pub async fn open(&self, request_path: &str) -> Result<ResourceHandle, OpenError> {
        self.open_with(request_path, Fetch::Content).await
    }

    /// [`open`](Self::open), retrieving only what `fetch` asks for.
    ///
    /// Records one resolution outcome per call.
    pub async fn open_with(
        &self,
        request_path: &str,
        fetch: Fetch,
    ) -> Result<ResourceHandle, OpenError> {
        let result = self.lookup(request_path, fetch).await;
        let outcome = match &result {
            Ok(handle) if handle.is_dir() => "directory",
            Ok(_) => "file",
            Err(OpenError::BadRequest(_)) => "bad_request",
            Err(OpenError::NotExist) => "not_exist",
        };
        metrics::record_resolution(&self.name, outcome);
        result
    }

    /// Resolution without metrics, for follow-up lookups within a request
    /// that has already been counted.
    pub(crate) async fn lookup(
        &self,
        request_path: &str,
        fetch: Fetch,
    ) -> Result<ResourceHandle, OpenError> {
        let decoded = path::decode_path(request_path).map_err(|e| {
            tracing::debug!(site = %self.name, path = %request_path, error = %e, "Rejecting undecodable path");
            e
        })?;

        let key = path::join(&self.prefix, &path::clean(&decoded));

        if key.is_empty() || self.is_directory(&key).await {
            return Ok(ResourceHandle::directory(key));
        }

        for (resolution, candidate) in self.candidates(&key) {
            if let Some(handle) = self.try_candidate(resolution, &candidate, fetch).await {
                tracing::debug!(
                    site = %self.name,
                    path = %request_path,
                    key = %candidate,
                    resolution = resolution.as_str(),
                    "Resolved"
                );
                return Ok(handle);
            }
        }

        tracing::debug!(site = %self.name, path = %request_path, key = %key, "No candidate could be served");
        Err(OpenError::NotExist)
    }

    /// List the immediate children of a directory handle's prefix.
    pub async fn read_dir(&self, prefix: &str, limit: usize) -> Result<Vec<DirEntry>, StoreError> {
        let listing_prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        self.store
            .list_directory(&self.bucket, &listing_prefix, limit)
            .await
    }

    /// A key is a directory when at least one object lives under `<key>/`.
    async fn is_directory(&self, key: &str) -> bool {
        match self.store.has_prefix(&self.bucket, &format!("{key}/")).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(site = %self.name, key = %key, error = %e, "Directory check failed, treating as file");
                metrics::record_candidate_failure(&self.name);
                false
            }
        }
    }

    /// Ordered, de-duplicated candidate keys for a non-directory key.
    fn candidates(&self, key: &str) -> Vec<(Resolution, String)> {
        let mut chain = vec![(Resolution::Requested, key.to_string())];
        if self.spa {
            chain.push((Resolution::SiteIndex, path::join(&self.prefix, "index.html")));
        } else {
            chain.push((Resolution::DirectoryIndex, path::join(key, "index.html")));
            chain.push((Resolution::DirectoryIndex, path::join(key, "index.htm")));
        }
        if let Some(not_found) = &self.not_found_key {
            chain.push((Resolution::NotFoundPage, not_found.clone()));
        }

        let mut seen = HashSet::new();
        chain.retain(|(_, candidate)| seen.insert(candidate.clone()));
        chain
    }

    async fn try_candidate(
        &self,
        resolution: Resolution,
        key: &str,
        fetch: Fetch,
    ) -> Option<ResourceHandle> {
        let meta = match self.store.stat_object(&self.bucket, key).await {
            Ok(meta) => meta,
            Err(e) => {
                self.log_candidate_error(key, &e);
                return None;
            }
        };
        if fetch == Fetch::Metadata {
            return Some(ResourceHandle::metadata(resolution, meta));
        }

        match self.store.get_object(&self.bucket, key).await {
            Ok(object) => Some(ResourceHandle::file(resolution, object.meta, object.body)),
            Err(e) => {
                self.log_candidate_error(key, &e);
                None
            }
        }
    }

    fn log_candidate_error(&self, key: &str, error: &StoreError) {
        if error.is_not_found() {
            tracing::debug!(site = %self.name, key = %key, "Candidate not found");
        } else {
            tracing::warn!(site = %self.name, key = %key, error = %error, "Candidate unavailable");
            metrics::record_candidate_failure(&self.name);
        }
    }
}
