//! S3 adapter built on `aws-sdk-s3`.
//!
//! # Responsibilities
//! - Build one client per process from static credentials
//! - Map SDK outputs onto [`ObjectMeta`], [`StoredObject`] and [`DirEntry`]
//! - Map SDK failures onto [`StoreError`]
//!
//! # Design Decisions
//! - One pooled rustls client: idle sockets are capped per host and
//!   closed after `idle_timeout_secs`
//! - The connect timeout covers both TCP dial and TLS handshake, so the
//!   larger of the two configured values wins
//! - Prefix checks ask for `max_keys = 1` and never paginate

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, SharedHttpClient};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime as SdkDateTime};
use aws_sdk_s3::Client;
use aws_smithy_http_client::tls::{self, rustls_provider::CryptoMode};
use aws_smithy_http_client::Builder as HttpClientBuilder;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};

use super::{ContentStream, DirEntry, ObjectMeta, ObjectStore, StoreError, StoredObject};
use crate::config::StoreConfig;

/// Object store backed by an S3-compatible endpoint.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    endpoint: String,
}

impl fmt::Debug for S3Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Store")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    /// Build the shared client. Called once during startup.
    pub fn from_config(config: &StoreConfig) -> Self {
        let endpoint = format!("{}://{}", config.scheme, config.endpoint.trim_end_matches('/'));

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "s3web-static",
        );

        let connect = config.dial_timeout_secs.max(config.tls_handshake_timeout_secs);
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(connect))
            .build();

        let sdk_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&endpoint)
            .force_path_style(config.path_style)
            .timeout_config(timeouts)
            .http_client(pooled_http_client(config))
            .build();

        tracing::info!(
            endpoint = %endpoint,
            region = %config.region,
            path_style = config.path_style,
            connect_timeout_secs = connect,
            idle_timeout_secs = config.idle_timeout_secs,
            max_idle_connections = config.max_idle_connections,
            "Object store client configured"
        );

        Self {
            client: Client::from_conf(sdk_config),
            endpoint,
        }
    }
}

/// HTTPS client whose pool honours the configured idle limits.
fn pooled_http_client(config: &StoreConfig) -> SharedHttpClient {
    HttpClientBuilder::new()
        .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .pool_max_idle_per_host(config.max_idle_connections)
        .tls_provider(tls::Provider::Rustls(CryptoMode::AwsLc))
        .build_https()
}

fn to_chrono(value: Option<&SdkDateTime>) -> Option<DateTime<Utc>> {
    value.and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
}

fn to_size(value: Option<i64>, key: &str) -> Result<u64, StoreError> {
    match value {
        Some(len) if len >= 0 => Ok(len as u64),
        Some(len) => Err(StoreError::Malformed(format!("negative content length {len} for {key}"))),
        None => Err(StoreError::Malformed(format!("missing content length for {key}"))),
    }
}

/// Turn an SDK error into a [`StoreError`], keeping missing keys distinguishable.
fn map_sdk_error<E>(key: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    if let Some(service) = err.as_service_error() {
        let missing_key = match service.code() {
            Some("NoSuchKey") | Some("NotFound") => true,
            // HEAD responses carry no body, so there may be no code at all.
            None => err.raw_response().is_some_and(|r| r.status().as_u16() == 404),
            Some(_) => false,
        };
        if missing_key {
            return StoreError::NotFound(key.to_string());
        }
    }
    StoreError::Request(DisplayErrorContext(&err).to_string())
}

fn into_content(body: ByteStream) -> ContentStream {
    stream::try_unfold(body, |mut body| async move {
        match body.try_next().await {
            Ok(Some(chunk)) => Ok(Some((chunk, body))),
            Ok(None) => Ok(None),
            Err(e) => Err(std::io::Error::other(e)),
        }
    })
    .boxed()
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(key, e))?;

        let meta = ObjectMeta {
            key: key.to_string(),
            size: to_size(output.content_length(), key)?,
            last_modified: to_chrono(output.last_modified()),
            content_type: output.content_type().map(str::to_string),
            etag: output.e_tag().map(str::to_string),
        };

        Ok(StoredObject {
            meta,
            body: into_content(output.body),
        })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(key, e))?;

        Ok(ObjectMeta {
            key: key.to_string(),
            size: to_size(output.content_length(), key)?,
            last_modified: to_chrono(output.last_modified()),
            content_type: output.content_type().map(str::to_string),
            etag: output.e_tag().map(str::to_string),
        })
    }

    async fn has_prefix(&self, bucket: &str, prefix: &str) -> Result<bool, StoreError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| map_sdk_error(prefix, e))?;

        Ok(!output.contents().is_empty() || !output.common_prefixes().is_empty())
    }

    async fn list_directory(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<DirEntry>, StoreError> {
        let max_keys = i32::try_from(limit).unwrap_or(i32::MAX);
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .delimiter("/")
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| map_sdk_error(prefix, e))?;

        let directories = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .filter_map(|p| p.strip_prefix(prefix))
            .map(|name| DirEntry::Directory {
                name: name.trim_end_matches('/').to_string(),
            });

        let files = output
            .contents()
            .iter()
            .filter_map(|object| {
                let name = object.key()?.strip_prefix(prefix)?;
                // A "directory marker" object equal to the prefix itself.
                if name.is_empty() {
                    return None;
                }
                Some(DirEntry::File {
                    name: name.to_string(),
                    size: object.size().unwrap_or_default().max(0) as u64,
                    last_modified: to_chrono(object.last_modified()),
                })
            });

        let mut entries: Vec<DirEntry> = directories.chain(files).collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_size() {
        assert_eq!(to_size(Some(42), "k").unwrap(), 42);
        assert!(matches!(to_size(Some(-1), "k"), Err(StoreError::Malformed(_))));
        assert!(matches!(to_size(None, "k"), Err(StoreError::Malformed(_))));
    }

    #[test]
    fn test_to_chrono() {
        let dt = SdkDateTime::from_secs(1_700_000_000);
        let converted = to_chrono(Some(&dt)).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
        assert_eq!(to_chrono(None), None);
    }

    #[tokio::test]
    async fn test_client_builds_from_config() {
        let config = StoreConfig {
            endpoint: "minio.local:9000/".into(),
            scheme: "http".into(),
            bucket: "websites".into(),
            ..StoreConfig::default()
        };
        let store = S3Store::from_config(&config);
        assert_eq!(store.endpoint, "http://minio.local:9000");
        assert!(store.client.config().http_client().is_some());
        assert_eq!(
            store.client.config().timeout_config().and_then(|t| t.connect_timeout()),
            Some(Duration::from_secs(30))
        );
    }
}
