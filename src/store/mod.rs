//! Object store access.
//!
//! # Data Flow
//! ```text
//! VirtualFileSystem
//!     → ObjectStore trait (has_prefix / stat_object / get_object / list_directory)
//!     → s3.rs (aws-sdk-s3 client, pooled, built once at startup)
//!     → memory.rs (in-process store for tests and local runs)
//! ```
//!
//! # Design Decisions
//! - Read-only: the trait has no put or delete
//! - One client per process, shared as `Arc<dyn ObjectStore>`
//! - Implementations hold no per-request state and need no locking on the hot path
//! - Every call takes the bucket explicitly so sites may live in different buckets

pub mod error;
pub mod memory;
pub mod s3;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use s3::S3Store;

/// Streamed object content.
pub type ContentStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Metadata returned by a stat call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// An object together with its content stream.
pub struct StoredObject {
    pub meta: ObjectMeta,
    pub body: ContentStream,
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// One entry of a delimited listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirEntry {
    /// A common prefix, named without its trailing separator.
    Directory { name: String },
    /// An object directly under the listed prefix.
    File {
        name: String,
        size: u64,
        last_modified: Option<DateTime<Utc>>,
    },
}

impl DirEntry {
    pub fn name(&self) -> &str {
        match self {
            DirEntry::Directory { name } | DirEntry::File { name, .. } => name,
        }
    }
}

/// Read-only view of an S3-compatible object store.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Fetch an object's content and metadata.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError>;

    /// Fetch only an object's metadata.
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError>;

    /// Whether at least one key starts with `prefix`.
    ///
    /// Implementations must ask for no more than one key.
    async fn has_prefix(&self, bucket: &str, prefix: &str) -> Result<bool, StoreError>;

    /// List the immediate children of `prefix` (which ends with `/` or is empty).
    async fn list_directory(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<DirEntry>, StoreError>;
}
