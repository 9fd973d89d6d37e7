//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the site dispatcher
//! - Wire up middleware (request ID, tracing, timeout, compression)
//! - Bind server to listener
//! - Dispatch requests to the matching site by Host header
//! - Hand unmatched hosts on to the next handler

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    compression::CompressionLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

use crate::config::AppConfig;
use crate::http::request::{request_host, request_id};
use crate::http::response::serve_site;
use crate::observability::metrics;
use crate::routing::SiteRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub sites: Arc<SiteRouter>,
}

/// HTTP front end serving every configured site.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server over an already built site router.
    pub fn new(config: AppConfig, sites: SiteRouter) -> Self {
        let state = AppState {
            sites: Arc::new(sites),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let router = Router::new()
            .fallback(not_configured)
            .layer(middleware::from_fn_with_state(state, site_dispatch));

        let router = if config.server.gzip {
            router.layer(CompressionLayer::new())
        } else {
            router
        };

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            host = request_host(request).unwrap_or("-"),
                            request_id = request_id(request),
                        )
                    })
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(LatencyUnit::Millis),
                    ),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving the server in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            gzip = self.config.server.gzip,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Serve requests for configured hosts; pass everything else on.
async fn site_dispatch(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();

    let Some(site) = request_host(&request).and_then(|host| state.sites.resolve(host)) else {
        tracing::debug!(
            host = request_host(&request).unwrap_or("-"),
            "No site configured for host"
        );
        return next.run(request).await;
    };

    let (parts, _body) = request.into_parts();
    let response = serve_site(&site, &parts).await;
    metrics::record_request(site.name(), response.status().as_u16(), start);
    response
}

/// Last handler in the chain: nothing claimed the host.
async fn not_configured() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "No site configured for this host")
}
