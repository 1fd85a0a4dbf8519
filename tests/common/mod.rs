//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use relay_gateway::config::ListenerConfig;
use relay_gateway::dispatch::DEFAULT_MAX_RESPONSE_BYTES;
use relay_gateway::http::BufferingPolicy;
use relay_gateway::lifecycle::{GatewaySettings, RelayGateway};
use relay_gateway::pipeline::{Pipeline, ServicePipeline};
use relay_gateway::relay::{
    HttpRelayTransport, InboundEnvelope, IssuerCredentials, LoopbackTransport,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

pub const RELAY_ORIGIN: &str = "sb://ns.relay.example";
pub const RELAY_ADDRESS: &str = "sb://ns.relay.example/app";

pub fn settings(buffering: BufferingPolicy) -> GatewaySettings {
    GatewaySettings {
        address: Url::parse(RELAY_ADDRESS).unwrap(),
        credentials: IssuerCredentials::new("owner", "test-secret"),
        buffering,
        max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
    }
}

/// Envelope whose target is `path` on the relay origin, the same shape the
/// HTTP transport delivers: the path replaces the address path.
pub fn envelope(method: &str, path: &str) -> InboundEnvelope {
    InboundEnvelope::new(method, format!("{RELAY_ORIGIN}{path}"))
}

/// Open a gateway on a loopback transport with `router` as the pipeline.
pub async fn loopback_gateway(
    router: Router,
    buffering: BufferingPolicy,
) -> (RelayGateway, LoopbackTransport) {
    loopback_gateway_with(Arc::new(ServicePipeline::new(router)), buffering).await
}

pub async fn loopback_gateway_with(
    pipeline: Arc<dyn Pipeline>,
    buffering: BufferingPolicy,
) -> (RelayGateway, LoopbackTransport) {
    let transport = LoopbackTransport::new();
    let mut gateway =
        RelayGateway::new(settings(buffering), pipeline, Arc::new(transport.clone()));
    gateway.open().await.unwrap();
    (gateway, transport)
}

/// Open a gateway on an HTTP listener bound to an ephemeral port.
pub async fn http_gateway(
    router: Router,
    exchange_timeout_secs: u64,
) -> (RelayGateway, SocketAddr) {
    let transport = HttpRelayTransport::new(ListenerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        exchange_timeout_secs,
        ..ListenerConfig::default()
    });
    let mut gateway = RelayGateway::new(
        settings(BufferingPolicy::Streaming),
        Arc::new(ServicePipeline::new(router)),
        Arc::new(transport),
    );
    gateway.open().await.unwrap();
    let addr = gateway.local_addr().unwrap();
    (gateway, addr)
}

/// Start a raw backend that answers every connection with `response`
/// verbatim, so tests control the status line byte for byte.
pub async fn start_raw_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
