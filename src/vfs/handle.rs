//! Resolved resources.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::store::{ContentStream, ObjectMeta};

/// Which step of resolution produced a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The path denotes a directory (root, or a prefix with children).
    Directory,
    /// The requested key itself.
    Requested,
    /// The site-wide `index.html` of a single-page app.
    SiteIndex,
    /// `<path>/index.html` or `<path>/index.htm`.
    DirectoryIndex,
    /// The not-found page.
    NotFoundPage,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Directory => "directory",
            Resolution::Requested => "requested",
            Resolution::SiteIndex => "site_index",
            Resolution::DirectoryIndex => "directory_index",
            Resolution::NotFoundPage => "not_found_page",
        }
    }
}

enum Content {
    File(ContentStream),
    /// A file whose content was not fetched.
    Metadata,
    Directory { prefix: String },
}

/// The outcome of a successful `open`.
///
/// Either a readable file or a directory, never both. Owned by the request
/// that produced it and dropped once the response is written.
pub struct ResourceHandle {
    resolved_key: String,
    resolution: Resolution,
    size: u64,
    last_modified: Option<DateTime<Utc>>,
    content_type: Option<String>,
    etag: Option<String>,
    content: Content,
}

impl ResourceHandle {
    pub(crate) fn file(resolution: Resolution, meta: ObjectMeta, body: ContentStream) -> Self {
        Self {
            resolved_key: meta.key,
            resolution,
            size: meta.size,
            last_modified: meta.last_modified,
            content_type: meta.content_type,
            etag: meta.etag,
            content: Content::File(body),
        }
    }

    pub(crate) fn metadata(resolution: Resolution, meta: ObjectMeta) -> Self {
        Self {
            resolved_key: meta.key,
            resolution,
            size: meta.size,
            last_modified: meta.last_modified,
            content_type: meta.content_type,
            etag: meta.etag,
            content: Content::Metadata,
        }
    }

    pub(crate) fn directory(prefix: String) -> Self {
        Self {
            resolved_key: prefix.clone(),
            resolution: Resolution::Directory,
            size: 0,
            last_modified: None,
            content_type: None,
            etag: None,
            content: Content::Directory { prefix },
        }
    }

    /// Object key that satisfied the request (the prefix for directories).
    pub fn resolved_key(&self) -> &str {
        &self.resolved_key
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Bucket-relative prefix of a directory, without trailing `/`.
    pub fn directory_prefix(&self) -> Option<&str> {
        match &self.content {
            Content::Directory { prefix } => Some(prefix),
            Content::File(_) | Content::Metadata => None,
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("resolved_key", &self.resolved_key)
            .field("resolution", &self.resolution)
            .field("is_dir", &self.is_dir())
            .field("size", &self.size)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

/// What a response writer needs from something servable.
///
/// A file-like resource: a directory flag, a size, a modification time and,
/// for files, a readable stream.
pub trait Resource {
    fn is_dir(&self) -> bool;

    fn size(&self) -> u64;

    fn modified(&self) -> Option<DateTime<Utc>>;

    /// Key or path the resource was found under.
    fn name(&self) -> &str;

    /// Stored content type, if the backend knows one.
    fn content_type(&self) -> Option<&str>;

    /// Entity tag, if the backend knows one.
    fn etag(&self) -> Option<&str>;

    /// Consume the resource into its byte stream. `None` for directories
    /// and for files opened without content.
    fn into_content(self) -> Option<ContentStream>
    where
        Self: Sized;
}

impl Resource for ResourceHandle {
    fn is_dir(&self) -> bool {
        matches!(self.content, Content::Directory { .. })
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    fn name(&self) -> &str {
        &self.resolved_key
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn into_content(self) -> Option<ContentStream> {
        match self.content {
            Content::File(body) => Some(body),
            Content::Metadata | Content::Directory { .. } => None,
        }
    }
}
