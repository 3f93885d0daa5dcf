//! revproxy
//!
//! A reverse proxy that forwards requests to configured upstreams and can
//! merge upstream HTML into a site theme on the way back.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ routing ──▶ proxy::forwarder ──▶ proxy::transport ──▶ Upstream
//!                     (request id,     (host,      (URL, headers,       (pooled client,
//!                      identity)        prefix)     body, retries)       per-host slots)
//!
//!     Client Response
//!     ◀────────────── proxy::relay ◀──────────────────────────────────────────────────────── Upstream
//!                     (headers; HTML → theming: rules + template → merged document)
//!
//!     Cross-cutting: config, observability (tracing, Prometheus), lifecycle (signals, drain)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use revproxy::config::loader::load_config;
use revproxy::config::validation::validate_config;
use revproxy::config::ServerConfig;
use revproxy::http::HttpServer;
use revproxy::lifecycle::{signals::shutdown_on_signal, Shutdown};
use revproxy::observability::{logging::init_logging, metrics::init_metrics};

#[derive(Debug, Parser)]
#[command(name = "revproxy", version, about = "Reverse proxy with HTML theming")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = ServerConfig::default();
            if let Err(errors) = validate_config(&config) {
                for error in &errors {
                    eprintln!("configuration error: {}", error);
                }
                return Err("no configuration given; pass --config <path>".into());
            }
            config
        }
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "revproxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        proxies = config.proxies.len(),
        request_timeout_secs = config.timeouts.request_secs,
        retries = config.retries.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let server = HttpServer::new(config.clone())?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_on_signal(&shutdown).await;
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
