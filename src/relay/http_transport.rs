//! HTTP listener relay transport.
//!
//! # Responsibilities
//! - Accept HTTP requests on a local socket and deliver each as an envelope
//! - Turn the exchange outcome back into an HTTP response
//! - Bound every exchange in time and the endpoint in concurrency
//!
//! # Design Decisions
//! - The envelope target is the relay address with the request's path and
//!   query, so the pipeline sees the public URI, not the listener's
//! - `application/json` bodies are hinted as JSON, everything else as raw
//! - Faults never leak detail beyond the translation message; pipeline
//!   faults are a bare 500
//! - Dropping the handler future (timeout, client gone) cancels the exchange
//!
//! # Data Flow
//! ```text
//! TcpListener → TraceLayer → GlobalConcurrencyLimitLayer → TimeoutLayer
//!     → relay_handler (Request → InboundEnvelope)
//!     → EnvelopeHandler::handle → Exchange
//!     → ExchangeOutcome → Response
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use futures_util::future::BoxFuture;
use hyper::ext::ReasonPhrase;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use url::Url;

use crate::config::ListenerConfig;
use crate::dispatch::{ExchangeFault, ExchangeOutcome};
use crate::http::body::is_exhausted;
use crate::relay::envelope::{InboundEnvelope, OutboundReply, Payload, RepeatedValues};
use crate::relay::transport::{
    EndpointBinding, EnvelopeHandler, RelayEndpoint, RelayTransport, TransportError,
};

/// Connection-scoped headers that are never relayed.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// Relay transport served from a local HTTP listener.
#[derive(Debug, Clone)]
pub struct HttpRelayTransport {
    config: ListenerConfig,
}

impl HttpRelayTransport {
    pub fn new(config: ListenerConfig) -> Self {
        Self { config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(&self, state: RelayState) -> Router {
        Router::new()
            .route("/{*path}", any(relay_handler))
            .route("/", any(relay_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.exchange_timeout_secs,
            )))
            .layer(GlobalConcurrencyLimitLayer::new(
                self.config.max_concurrent_exchanges,
            ))
            .layer(TraceLayer::new_for_http())
    }
}

impl RelayTransport for HttpRelayTransport {
    fn repeated_values(&self) -> RepeatedValues {
        if self.config.join_repeated_headers {
            RepeatedValues::CommaJoined
        } else {
            RepeatedValues::Separate
        }
    }

    fn bind(
        &self,
        binding: EndpointBinding,
    ) -> BoxFuture<'_, Result<Box<dyn RelayEndpoint>, TransportError>> {
        Box::pin(async move {
            let bind_address = self.config.bind_address.clone();
            let listener = TcpListener::bind(&bind_address).await.map_err(|source| {
                TransportError::Bind {
                    address: bind_address.clone(),
                    source,
                }
            })?;
            let local_addr = listener.local_addr().map_err(|source| TransportError::Bind {
                address: bind_address,
                source,
            })?;

            tracing::info!(
                address = %binding.address,
                listen = %local_addr,
                issuer = binding.credentials.issuer_name(),
                "Relay endpoint listening"
            );

            let router = self.build_router(RelayState {
                address: Arc::new(binding.address),
                handler: binding.handler,
            });

            let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
            let server = tokio::spawn(async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async {
                        // A dropped sender shuts down as well.
                        let _ = shutdown_rx.await;
                    })
                    .await
            });

            Ok(Box::new(HttpRelayEndpoint {
                local_addr,
                shutdown: shutdown_tx,
                server,
            }) as Box<dyn RelayEndpoint>)
        })
    }
}

/// A listening HTTP endpoint. Dropping it starts a graceful shutdown.
struct HttpRelayEndpoint {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<std::io::Result<()>>,
}

impl RelayEndpoint for HttpRelayEndpoint {
    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), TransportError>> {
        let HttpRelayEndpoint {
            local_addr,
            shutdown,
            server,
        } = *self;

        Box::pin(async move {
            let _ = shutdown.send(());
            match server.await {
                Ok(Ok(())) => {
                    tracing::info!(listen = %local_addr, "Relay endpoint closed");
                    Ok(())
                }
                Ok(Err(e)) => Err(TransportError::Close(e)),
                Err(e) => Err(TransportError::Close(std::io::Error::other(e))),
            }
        })
    }
}

#[derive(Clone)]
struct RelayState {
    address: Arc<Url>,
    handler: Arc<dyn EnvelopeHandler>,
}

async fn relay_handler(State(state): State<RelayState>, request: Request<Body>) -> Response {
    let envelope = to_envelope(&state.address, request);
    let exchange = state.handler.handle(envelope);
    let id = exchange.id();

    match exchange.await {
        ExchangeOutcome::Completed(reply) => reply.into_response(),
        ExchangeOutcome::Faulted(ExchangeFault::Translation(e)) => {
            tracing::debug!(exchange = %id, error = %e, "Rejected malformed request");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        ExchangeOutcome::Faulted(fault) => {
            tracing::error!(exchange = %id, error = %fault, "Exchange faulted");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        ExchangeOutcome::Canceled => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Convert a listener request into the envelope the relay would deliver.
fn to_envelope(address: &Url, request: Request<Body>) -> InboundEnvelope {
    let (parts, body) = request.into_parts();

    let mut target = address.clone();
    target.set_path(parts.uri.path());
    target.set_query(parts.uri.query());

    let mut headers = HeaderMap::with_capacity(parts.headers.len());
    for (name, value) in parts.headers.iter() {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    let payload = if is_exhausted(&body) {
        None
    } else if is_json(&headers) {
        Some(Payload::Json(body))
    } else {
        Some(Payload::Raw(body))
    };

    InboundEnvelope {
        method: parts.method.as_str().to_string(),
        target: target.into(),
        headers,
        payload,
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

impl IntoResponse for OutboundReply {
    fn into_response(self) -> Response {
        let OutboundReply { envelope, body } = self;
        let body = match body {
            Some(bytes) if !envelope.suppress_body() => Body::from(bytes),
            _ => Body::empty(),
        };

        let mut response = Response::new(body);
        *response.status_mut() = envelope.status();

        let reason = envelope.reason_phrase();
        if envelope.status().canonical_reason() != Some(reason) {
            match ReasonPhrase::try_from(reason.as_bytes()) {
                Ok(phrase) => {
                    response.extensions_mut().insert(phrase);
                }
                Err(_) => tracing::debug!(reason, "Dropping unencodable reason phrase"),
            }
        }

        let headers = response.headers_mut();
        for (name, value) in envelope.headers().iter() {
            if !is_hop_by_hop(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        response
    }
}
