//! Relay Gateway
//!
//! Exposes a local HTTP server through a relay endpoint.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                    RELAY GATEWAY                     │
//!                         │                                                      │
//!     Relay envelope      │  ┌───────────┐    ┌────────────┐    ┌────────────┐  │
//!     ────────────────────┼─▶│  relay    │───▶│  dispatch  │───▶│   http     │  │
//!                         │  │ transport │    │ orchestr.  │    │ translate  │  │
//!                         │  └───────────┘    └─────┬──────┘    └─────┬──────┘  │
//!                         │                         │                 │         │
//!                         │                         ▼                 ▼         │
//!     Outbound envelope   │  ┌───────────┐    ┌────────────┐    ┌────────────┐  │
//!     ◀───────────────────┼──│ outbound  │◀───│  response  │◀───│  pipeline  │◀─┼──── Local
//!                         │  │ envelope  │    │ translate  │    │  (invoke)  │  │     Server
//!                         │  └───────────┘    └────────────┘    └────────────┘  │
//!                         │                                                      │
//!                         │  ┌────────────────────────────────────────────────┐ │
//!                         │  │ config · lifecycle · observability             │ │
//!                         │  └────────────────────────────────────────────────┘ │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use relay_gateway::config::{load_config, GatewayConfig};
use relay_gateway::lifecycle::{shutdown_signal, GatewaySettings, RelayGateway};
use relay_gateway::observability::{init_logging, init_metrics};
use relay_gateway::pipeline::UpstreamPipeline;
use relay_gateway::relay::HttpRelayTransport;

#[derive(Parser)]
#[command(name = "relay-gateway", version, about = "Relay gateway for a local HTTP server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read request bodies into memory before forwarding them.
    #[arg(long)]
    buffer_request_content: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if cli.buffer_request_content {
        config.dispatch.buffer_request_content = true;
    }

    init_logging(&config.observability)?;

    tracing::info!("relay-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        relay_address = %config.relay.address,
        bind_address = %config.listener.bind_address,
        upstream_address = %config.pipeline.upstream_address,
        buffer_request_content = config.dispatch.buffer_request_content,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pipeline = Arc::new(UpstreamPipeline::new(&config.pipeline)?);
    let transport = Arc::new(HttpRelayTransport::new(config.listener.clone()));
    let settings = GatewaySettings::from_config(&config)?;

    let mut gateway = RelayGateway::new(settings, pipeline, transport);
    gateway.open().await?;

    shutdown_signal().await;

    gateway.close().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
