//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (Host header)
//!     → host.rs (strip port, lowercase)
//!     → router.rs (domain lookup)
//!     → Return: the site's VirtualFileSystem, or None (not configured)
//!
//! Registry compilation (at startup):
//!     SiteConfig[]
//!     → one VirtualFileSystem per site
//!     → one map entry per domain alias
//!     → freeze as immutable SiteRouter
//! ```
//!
//! # Design Decisions
//! - Sites compiled at startup, immutable at runtime
//! - Deterministic: same host always maps to the same site
//! - A domain belongs to exactly one site

pub mod host;
pub mod router;

pub use host::normalize_host;
pub use router::{RegistryError, SiteRegistry, SiteRouter};
