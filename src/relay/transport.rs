//! Relay transport contracts.
//!
//! # Responsibilities
//! - Define how a transport binds an endpoint to a single envelope handler
//! - Define how a bound endpoint is released
//!
//! # Design Decisions
//! - A transport declares how its outbound header collection stores
//!   repeated values; the gateway builds its dispatcher accordingly
//! - What happens to in-flight exchanges on close is up to the transport
//! - No retries; bind and close failures go straight to the caller

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use url::Url;

use crate::dispatch::{Dispatcher, Exchange};
use crate::relay::credentials::IssuerCredentials;
use crate::relay::envelope::{InboundEnvelope, RepeatedValues};

/// Failure to open or close a relay endpoint.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind relay endpoint {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("relay endpoint {0} is already bound")]
    AlreadyBound(Url),

    #[error("relay endpoint is not bound")]
    NotBound,

    #[error("relay endpoint failed while closing: {0}")]
    Close(#[source] std::io::Error),
}

/// Receives every envelope delivered to a bound endpoint.
///
/// One handler instance serves overlapping calls.
pub trait EnvelopeHandler: Send + Sync + 'static {
    fn handle(&self, envelope: InboundEnvelope) -> Exchange;
}

impl EnvelopeHandler for Dispatcher {
    fn handle(&self, envelope: InboundEnvelope) -> Exchange {
        self.dispatch(envelope)
    }
}

/// Everything a transport needs to open an endpoint.
#[derive(Clone)]
pub struct EndpointBinding {
    pub address: Url,
    pub credentials: IssuerCredentials,
    pub handler: Arc<dyn EnvelopeHandler>,
}

impl std::fmt::Debug for EndpointBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointBinding")
            .field("address", &self.address.as_str())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// A relay transport that can host endpoints.
pub trait RelayTransport: Send + Sync + 'static {
    /// How the outbound header collection of this transport stores a
    /// repeated name.
    fn repeated_values(&self) -> RepeatedValues;

    /// Open an endpoint and start delivering envelopes to its handler.
    fn bind(
        &self,
        binding: EndpointBinding,
    ) -> BoxFuture<'_, Result<Box<dyn RelayEndpoint>, TransportError>>;
}

/// An open endpoint.
pub trait RelayEndpoint: Send + Sync {
    /// Socket the endpoint listens on, for transports that have one.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// Stop accepting envelopes and release the endpoint.
    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), TransportError>>;
}
