//! s3web
//!
//! Serves many static websites out of one S3-compatible bucket, picking the
//! site by `Host` header.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ routing (Host → site) ──▶ vfs (path → key)
//!                                                                   │
//!                                                                   ▼
//!     Client Response                                          object store
//!     ◀────────────── response writer ◀──────── file / listing ◀────┘
//!
//!     Cross-cutting: config, observability, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;

use s3web::config::load_config;
use s3web::http::HttpServer;
use s3web::lifecycle::{self, Shutdown};
use s3web::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "s3web", version, about = "Static website server for S3 buckets")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/config.toml")]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    if args.check {
        println!(
            "{}: OK ({} sites)",
            args.config.display(),
            config.sites.len()
        );
        return Ok(());
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "s3web starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = lifecycle::connect_store(&config);
    let sites = lifecycle::build_router(&config, store)?;
    let listener = lifecycle::bind(&config).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    lifecycle::spawn_signal_handler(shutdown);

    HttpServer::new(config, sites)
        .run(listener, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
