//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for s3web.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Object store connection parameters.
    pub store: StoreConfig,

    /// Sites served out of the object store.
    pub sites: Vec<SiteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub listen: String,

    /// Gzip-compress responses when the client accepts it.
    pub gzip: bool,

    /// Total time allowed for a single request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            gzip: false,
            request_timeout_secs: 30,
        }
    }
}

/// Object store connection configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Host (and optional port) of the S3-compatible endpoint, without scheme.
    pub endpoint: String,

    /// "http" or "https".
    pub scheme: String,

    /// Static access key.
    pub access_key: String,

    /// Static secret key.
    pub secret_key: String,

    /// Default bucket for every site that does not name its own.
    pub bucket: String,

    /// Signing region.
    pub region: String,

    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    pub path_style: bool,

    /// TCP connect timeout in seconds.
    pub dial_timeout_secs: u64,

    /// Seconds an idle pooled connection is kept open.
    pub idle_timeout_secs: u64,

    /// TLS handshake timeout in seconds.
    pub tls_handshake_timeout_secs: u64,

    /// Upper bound on pooled idle connections per host.
    pub max_idle_connections: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:9000".to_string(),
            scheme: "https".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            region: "us-east-1".to_string(),
            path_style: true,
            dial_timeout_secs: 30,
            idle_timeout_secs: 60,
            tls_handshake_timeout_secs: 10,
            max_idle_connections: 1024,
        }
    }
}

// Hand-written so the secret key never ends up in a log line.
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("scheme", &self.scheme)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("path_style", &self.path_style)
            .field("dial_timeout_secs", &self.dial_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("tls_handshake_timeout_secs", &self.tls_handshake_timeout_secs)
            .field("max_idle_connections", &self.max_idle_connections)
            .finish()
    }
}

/// One website served from the object store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    /// Host names this site answers to.
    #[serde(alias = "domain", deserialize_with = "one_or_many")]
    pub domains: Vec<String>,

    /// Key prefix under which the site's files live.
    #[serde(default, alias = "sub_folder")]
    pub path_prefix: String,

    /// Single-page-app mode: unknown paths serve the site's `index.html`.
    #[serde(default)]
    pub spa: bool,

    /// Bucket override; falls back to `store.bucket`.
    #[serde(default)]
    pub bucket: Option<String>,

    /// Bucket-absolute key of the not-found page. Empty disables it.
    #[serde(default = "default_not_found_page")]
    pub not_found_page: String,

    /// Render HTML listings for directories without an index page.
    #[serde(default)]
    pub browse: bool,
}

impl SiteConfig {
    /// A site with the default not-found page and listings disabled.
    pub fn new(domains: Vec<String>, path_prefix: impl Into<String>, spa: bool) -> Self {
        Self {
            domains,
            path_prefix: path_prefix.into(),
            spa,
            bucket: None,
            not_found_page: default_not_found_page(),
            browse: false,
        }
    }
}

fn default_not_found_page() -> String {
    "404.html".to_string()
}

/// Accepts either `domain = "a"` or `domains = ["a", "b"]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(domain) => vec![domain],
        OneOrMany::Many(domains) => domains,
    })
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
