//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every site has at least one usable domain and a bucket to read from
//! - No domain is claimed by two sites
//! - Store connection parameters and timeouts are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::routing::host::normalize_host;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no sites configured")]
    NoSites,

    #[error("site #{site} has no domains")]
    NoDomains { site: usize },

    #[error("site #{site} has an invalid domain {domain:?}")]
    InvalidDomain { site: usize, domain: String },

    #[error("domain {domain:?} is claimed by site #{first} and site #{second}")]
    DuplicateDomain {
        domain: String,
        first: usize,
        second: usize,
    },

    #[error("site #{site} has no bucket and store.bucket is empty")]
    NoBucket { site: usize },

    #[error("store.scheme must be \"http\" or \"https\", got {0:?}")]
    InvalidScheme(String),

    #[error("store.endpoint is empty")]
    EmptyEndpoint,

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("server.listen {0:?} is not a socket address")]
    InvalidListen(String),
}

/// Check an [`AppConfig`] for semantic errors.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.listen.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidListen(config.server.listen.clone()));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("server.request_timeout_secs"));
    }

    let store = &config.store;
    if store.endpoint.trim().is_empty() {
        errors.push(ValidationError::EmptyEndpoint);
    }
    if store.scheme != "http" && store.scheme != "https" {
        errors.push(ValidationError::InvalidScheme(store.scheme.clone()));
    }
    for (name, value) in [
        ("store.dial_timeout_secs", store.dial_timeout_secs),
        ("store.idle_timeout_secs", store.idle_timeout_secs),
        ("store.tls_handshake_timeout_secs", store.tls_handshake_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if config.sites.is_empty() {
        errors.push(ValidationError::NoSites);
    }

    let mut owners: HashMap<String, usize> = HashMap::new();
    for (index, site) in config.sites.iter().enumerate() {
        if site.domains.is_empty() {
            errors.push(ValidationError::NoDomains { site: index });
        }

        for domain in &site.domains {
            let normalized = normalize_host(domain);
            if normalized.is_empty() || normalized.contains(char::is_whitespace) {
                errors.push(ValidationError::InvalidDomain {
                    site: index,
                    domain: domain.clone(),
                });
                continue;
            }
            match owners.get(&normalized) {
                // Repeating an alias within one site is harmless.
                Some(&first) if first == index => {}
                Some(&first) => errors.push(ValidationError::DuplicateDomain {
                    domain: normalized,
                    first,
                    second: index,
                }),
                None => {
                    owners.insert(normalized, index);
                }
            }
        }

        let bucket = site.bucket.as_deref().unwrap_or(&store.bucket);
        if bucket.trim().is_empty() {
            errors.push(ValidationError::NoBucket { site: index });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
