//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the object store client once
//! - Compile the site registry against it
//! - Bind the listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The store client is passed explicitly to every site, never global
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::routing::{RegistryError, SiteRegistry, SiteRouter};
use crate::store::{ObjectStore, S3Store};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("site registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Connect to the configured S3 endpoint.
pub fn connect_store(config: &AppConfig) -> Arc<dyn ObjectStore> {
    let store = S3Store::from_config(&config.store);
    tracing::info!(
        endpoint = %config.store.endpoint,
        scheme = %config.store.scheme,
        bucket = %config.store.bucket,
        path_style = config.store.path_style,
        "Object store client ready"
    );
    Arc::new(store)
}

/// Compile the site router over `store`.
pub fn build_router(
    config: &AppConfig,
    store: Arc<dyn ObjectStore>,
) -> Result<SiteRouter, StartupError> {
    let registry = SiteRegistry::from_config(&config.sites, &config.store.bucket, store)?;
    if registry.is_empty() {
        tracing::warn!("No sites registered, every request will be answered 404");
    }
    tracing::info!(
        sites = config.sites.len(),
        domains = registry.len(),
        "Site registry compiled"
    );
    Ok(SiteRouter::new(registry))
}

pub async fn bind(config: &AppConfig) -> Result<TcpListener, StartupError> {
    let addr = config.server.listen.clone();
    TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::store::InMemoryStore;

    fn config_with(sites: Vec<SiteConfig>) -> AppConfig {
        let mut config = AppConfig::default();
        config.store.bucket = "websites".to_string();
        config.sites = sites;
        config
    }

    #[test]
    fn test_build_router_over_shared_store() {
        let config = config_with(vec![
            SiteConfig::new(vec!["a.example".into(), "www.a.example".into()], "a", false),
            SiteConfig::new(vec!["b.example".into()], "b", true),
        ]);
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());

        let router = build_router(&config, store).unwrap();
        assert_eq!(router.registry().len(), 3);
        assert!(router.resolve("www.a.example:80").is_some());
    }

    #[test]
    fn test_build_router_rejects_duplicates() {
        let config = config_with(vec![
            SiteConfig::new(vec!["a.example".into()], "a", false),
            SiteConfig::new(vec!["A.example".into()], "b", false),
        ]);
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());

        let err = build_router(&config, store).unwrap_err();
        assert!(matches!(err, StartupError::Registry(RegistryError::DuplicateDomain(_))));
    }

    #[test]
    fn test_build_router_without_sites() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());
        let router = build_router(&config_with(vec![]), store).unwrap();
        assert!(router.registry().is_empty());
        assert!(router.resolve("a.example").is_none());
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let mut config = config_with(vec![]);
        config.server.listen = "127.0.0.1:0".to_string();
        let listener = bind(&config).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
