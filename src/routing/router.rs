//! Site registry and host lookup.
//!
//! # Responsibilities
//! - Build one virtual file system per configured site
//! - Map every domain alias onto its site's file system
//! - Look up the file system for an inbound `Host` header
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) host lookup via HashMap
//! - Unknown hosts are an explicit `None`, never a default site

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::SiteConfig;
use crate::routing::host::normalize_host;
use crate::store::ObjectStore;
use crate::vfs::VirtualFileSystem;

/// Why a registry could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("domain {0:?} is configured for more than one site")]
    DuplicateDomain(String),

    #[error("site #{0} has no usable domain")]
    NoDomains(usize),
}

/// Normalised domain → site file system. Built once, read-only afterwards.
#[derive(Debug, Default)]
pub struct SiteRegistry {
    sites: HashMap<String, Arc<VirtualFileSystem>>,
}

impl SiteRegistry {
    /// Build the registry. All aliases of a site share one file system.
    pub fn from_config(
        sites: &[SiteConfig],
        default_bucket: &str,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, RegistryError> {
        let mut map = HashMap::new();

        for (index, site) in sites.iter().enumerate() {
            let domains: Vec<String> = site
                .domains
                .iter()
                .map(|d| normalize_host(d))
                .filter(|d| !d.is_empty())
                .collect();
            let Some(primary) = domains.first() else {
                return Err(RegistryError::NoDomains(index));
            };

            let fs = Arc::new(VirtualFileSystem::new(
                primary.clone(),
                site,
                default_bucket,
                store.clone(),
            ));

            for domain in domains.iter() {
                if let Some(existing) = map.insert(domain.clone(), fs.clone()) {
                    if !Arc::ptr_eq(&existing, &fs) {
                        return Err(RegistryError::DuplicateDomain(domain.clone()));
                    }
                }
            }

            tracing::info!(
                site = %primary,
                domains = ?domains,
                bucket = %fs.bucket(),
                prefix = %fs.prefix(),
                spa = fs.is_spa(),
                "Site registered"
            );
        }

        Ok(Self { sites: map })
    }

    pub fn get(&self, domain: &str) -> Option<&Arc<VirtualFileSystem>> {
        self.sites.get(domain)
    }

    /// Number of registered domains (aliases count separately).
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Dispatches a `Host` header to its site.
#[derive(Debug, Default)]
pub struct SiteRouter {
    registry: SiteRegistry,
}

impl SiteRouter {
    pub fn new(registry: SiteRegistry) -> Self {
        Self { registry }
    }

    /// File system for `host`, or `None` when no site claims it.
    ///
    /// `None` means "not mine": the caller should hand the request on.
    pub fn resolve(&self, host: &str) -> Option<Arc<VirtualFileSystem>> {
        self.registry.get(&normalize_host(host)).cloned()
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn router(store: &Arc<InMemoryStore>) -> SiteRouter {
        let sites = vec![
            SiteConfig::new(vec!["a.example".into(), "WWW.A.EXAMPLE".into()], "/app", true),
            SiteConfig::new(vec!["b.example".into()], "", false),
        ];
        SiteRouter::new(SiteRegistry::from_config(&sites, "websites", store.clone()).unwrap())
    }

    #[test]
    fn test_resolves_configured_domains() {
        let store = Arc::new(InMemoryStore::new());
        let router = router(&store);

        let a = router.resolve("a.example").unwrap();
        assert_eq!(a.prefix(), "app");
        assert!(a.is_spa());
        assert_eq!(router.resolve("b.example").unwrap().prefix(), "");
        assert_eq!(router.registry().len(), 3);
    }

    #[test]
    fn test_port_and_case_are_ignored() {
        let store = Arc::new(InMemoryStore::new());
        let router = router(&store);

        let plain = router.resolve("a.example").unwrap();
        let with_port = router.resolve("a.example:8443").unwrap();
        let shouting = router.resolve("A.Example:80").unwrap();
        assert!(Arc::ptr_eq(&plain, &with_port));
        assert!(Arc::ptr_eq(&plain, &shouting));
    }

    #[test]
    fn test_aliases_share_one_file_system() {
        let store = Arc::new(InMemoryStore::new());
        let router = router(&store);

        let a = router.resolve("a.example").unwrap();
        let www = router.resolve("www.a.example").unwrap();
        assert!(Arc::ptr_eq(&a, &www));
        assert_eq!(www.name(), "a.example");
    }

    #[test]
    fn test_unknown_host_is_not_configured() {
        let store = Arc::new(InMemoryStore::new());
        let router = router(&store);

        assert!(router.resolve("z.example").is_none());
        assert!(router.resolve("").is_none());
        assert!(router.resolve("example").is_none());
        assert_eq!(store.calls().total(), 0);
    }

    #[test]
    fn test_duplicate_domain_rejected() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());
        let sites = vec![
            SiteConfig::new(vec!["a.example".into()], "", false),
            SiteConfig::new(vec!["a.example:8080".into()], "", false),
        ];
        let err = SiteRegistry::from_config(&sites, "websites", store).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateDomain("a.example".into()));
    }

    #[test]
    fn test_site_without_domains_rejected() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());
        let sites = vec![SiteConfig::new(vec![" ".into()], "", false)];
        let err = SiteRegistry::from_config(&sites, "websites", store).unwrap_err();
        assert_eq!(err, RegistryError::NoDomains(0));
    }
}
