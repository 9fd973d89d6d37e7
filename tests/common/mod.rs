//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use s3web::config::{AppConfig, SiteConfig};
use s3web::http::HttpServer;
use s3web::lifecycle::{self, Shutdown};
use s3web::store::{InMemoryStore, ObjectStore};
use tokio::net::TcpListener;

pub const BUCKET: &str = "websites";

/// The sites used across tests:
/// - `a.example`: single-page app under `app/`
/// - `b.example` / `www.b.example`: multi-page site at the bucket root
/// - `files.example`: multi-page site under `pub/` with listings enabled
pub fn sites() -> Vec<SiteConfig> {
    let mut files = SiteConfig::new(vec!["files.example".into()], "pub", false);
    files.browse = true;
    vec![
        SiteConfig::new(vec!["a.example".into()], "/app", true),
        SiteConfig::new(vec!["b.example".into(), "www.b.example".into()], "", false),
        files,
    ]
}

/// Objects backing [`sites`].
pub fn seeded_store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new()
        .with_object(BUCKET, "app/index.html", "<html>app shell</html>")
        .with_object(BUCKET, "app/assets/app.js", "console.log('app');")
        .with_object(BUCKET, "docs/index.html", "<html>docs</html>")
        .with_object(BUCKET, "guide/index.htm", "<html>guide</html>")
        .with_object(BUCKET, "about.html", "<html>about</html>")
        .with_object(BUCKET, "pub/readme.txt", "read me")
        .with_object(BUCKET, "pub/img/logo.png", vec![0x89u8, b'P', b'N', b'G']);
    Arc::new(store)
}

pub fn test_config(gzip: bool) -> AppConfig {
    let mut config = AppConfig::default();
    config.store.bucket = BUCKET.to_string();
    config.server.listen = "127.0.0.1:0".to_string();
    config.server.gzip = gzip;
    config.sites = sites();
    config
}

/// In-process router over `store`.
pub fn app(config: AppConfig, store: Arc<InMemoryStore>) -> Router {
    let store: Arc<dyn ObjectStore> = store;
    let sites = lifecycle::build_router(&config, store).unwrap();
    HttpServer::new(config, sites).router()
}

pub fn get(host: &str, uri: &str) -> Request<Body> {
    request(Method::GET, host, uri)
}

pub fn request(method: Method, host: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Host", host)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Run a real server on an ephemeral port. Trigger the returned
/// [`Shutdown`] to stop it.
#[allow(dead_code)]
pub async fn start_server(
    config: AppConfig,
    store: Arc<InMemoryStore>,
) -> (SocketAddr, Shutdown, tokio::task::JoinHandle<std::io::Result<()>>) {
    let store: Arc<dyn ObjectStore> = store;
    let sites = lifecycle::build_router(&config, store).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(HttpServer::new(config, sites).run(listener, rx));
    (addr, shutdown, handle)
}
