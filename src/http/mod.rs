//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout, gzip)
//!     → request.rs (host and correlation id)
//!     → [routing layer picks the site by Host]
//!     → response.rs (resolve path, write file, listing or error)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_host, request_id, X_REQUEST_ID};
pub use response::serve_site;
pub use server::HttpServer;
