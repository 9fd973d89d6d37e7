//! Multi-tenant static website server over an S3-compatible object store.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod store;
pub mod vfs;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::SiteRouter;
pub use store::ObjectStore;
pub use vfs::VirtualFileSystem;
