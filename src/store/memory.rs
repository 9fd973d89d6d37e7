//! In-process object store.
//!
//! Behaves like a bucket on a real S3 endpoint for the four read calls,
//! counts every call and can be told to fail specific keys. Tests lean on
//! the counters to prove that some paths never reach the store.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};

use super::{DirEntry, ObjectMeta, ObjectStore, StoreError, StoredObject};

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
    content_type: Option<String>,
}

/// Snapshot of how often each store operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub stat: usize,
    pub list: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.get + self.stat + self.list
    }
}

/// A thread-safe in-memory object store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<BTreeMap<(String, String), MemoryObject>>,
    failing: RwLock<HashSet<(String, String)>>,
    stalled: RwLock<HashSet<(String, String)>>,
    listings_fail: AtomicBool,
    get_calls: AtomicUsize,
    stat_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`InMemoryStore::put`].
    pub fn with_object(self, bucket: &str, key: &str, data: impl Into<Bytes>) -> Self {
        self.put(bucket, key, data);
        self
    }

    /// Store `data` under `key`, replacing any previous object.
    pub fn put(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.put_with_type(bucket, key, data, None);
    }

    /// Store `data` with an explicit content type.
    pub fn put_with_type(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
    ) {
        let object = MemoryObject {
            data: data.into(),
            last_modified: Utc::now(),
            content_type: content_type.map(str::to_string),
        };
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((bucket.to_string(), key.to_string()), object);
    }

    /// Make every get and stat of `key` fail with a transient error.
    pub fn fail_key(&self, bucket: &str, key: &str) {
        self.failing
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((bucket.to_string(), key.to_string()));
    }

    /// Make every stat of `key` hang until the caller gives up.
    pub fn stall_key(&self, bucket: &str, key: &str) {
        self.stalled
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((bucket.to_string(), key.to_string()));
    }

    fn is_stalled(&self, bucket: &str, key: &str) -> bool {
        self.stalled
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(bucket.to_string(), key.to_string()))
    }

    /// Make every listing call fail with a transient error.
    pub fn fail_listings(&self) {
        self.listings_fail.store(true, Ordering::SeqCst);
    }

    fn check_listing(&self, prefix: &str) -> Result<(), StoreError> {
        if self.listings_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Request(format!("injected listing failure for {prefix}")));
        }
        Ok(())
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            get: self.get_calls.load(Ordering::SeqCst),
            stat: self.stat_calls.load(Ordering::SeqCst),
            list: self.list_calls.load(Ordering::SeqCst),
        }
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<MemoryObject, StoreError> {
        let id = (bucket.to_string(), key.to_string());
        if self
            .failing
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&id)
        {
            return Err(StoreError::Request(format!("injected failure for {bucket}/{key}")));
        }
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn keys_with_prefix(&self, bucket: &str, prefix: &str) -> Vec<(String, MemoryObject)> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .range((bucket.to_string(), prefix.to_string())..)
            .take_while(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, k), o)| (k.clone(), o.clone()))
            .collect()
    }
}

fn meta_of(key: &str, object: &MemoryObject) -> ObjectMeta {
    ObjectMeta {
        key: key.to_string(),
        size: object.data.len() as u64,
        last_modified: Some(object.last_modified),
        content_type: object.content_type.clone(),
        etag: Some(format!("\"{:x}-{}\"", object.last_modified.timestamp(), object.data.len())),
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let object = self.lookup(bucket, key)?;
        let meta = meta_of(key, &object);
        let data = object.data;
        Ok(StoredObject {
            meta,
            body: stream::once(async move { Ok(data) }).boxed(),
        })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_stalled(bucket, key) {
            std::future::pending::<()>().await;
        }
        let object = self.lookup(bucket, key)?;
        Ok(meta_of(key, &object))
    }

    async fn has_prefix(&self, bucket: &str, prefix: &str) -> Result<bool, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_listing(prefix)?;
        Ok(self
            .objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .range((bucket.to_string(), prefix.to_string())..)
            .next()
            .is_some_and(|((b, k), _)| b == bucket && k.starts_with(prefix)))
    }

    async fn list_directory(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<DirEntry>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_listing(prefix)?;

        let mut seen_dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for (key, object) in self.keys_with_prefix(bucket, prefix) {
            if entries.len() >= limit {
                break;
            }
            let rest = &key[prefix.len()..];
            match rest.split_once('/') {
                Some((dir, _)) => {
                    if seen_dirs.insert(dir.to_string()) {
                        entries.push(DirEntry::Directory {
                            name: dir.to_string(),
                        });
                    }
                }
                None => entries.push(DirEntry::File {
                    name: rest.to_string(),
                    size: object.data.len() as u64,
                    last_modified: Some(object.last_modified),
                }),
            }
        }
        Ok(entries)
    }
}
