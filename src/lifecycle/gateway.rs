//! Gateway lifecycle.
//!
//! # Responsibilities
//! - Build the one shared dispatcher when the gateway opens
//! - Bind it to the relay endpoint with the issuer credentials
//! - Release the endpoint on close
//!
//! # Design Decisions
//! - `open` and `close` take `&mut self`; overlapping lifecycle calls are
//!   ruled out at compile time, repeated ones are reported as errors
//! - Exchanges are independent of the lifecycle once dispatched

use std::net::SocketAddr;
use std::sync::Arc;

use url::Url;

use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::http::BufferingPolicy;
use crate::pipeline::Pipeline;
use crate::relay::credentials::IssuerCredentials;
use crate::relay::transport::{EndpointBinding, RelayEndpoint, RelayTransport, TransportError};

/// Failure of a lifecycle operation.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway is already open")]
    AlreadyOpen,

    #[error("gateway is not open")]
    NotOpen,

    #[error("invalid relay address: {0}")]
    InvalidAddress(#[from] url::ParseError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// What the gateway needs to open an endpoint.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub address: Url,
    pub credentials: IssuerCredentials,
    pub buffering: BufferingPolicy,
    /// Response bodies larger than this fault their exchange.
    pub max_response_bytes: usize,
}

impl GatewaySettings {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            address: Url::parse(&config.relay.address)?,
            credentials: IssuerCredentials::new(
                config.relay.issuer_name.clone(),
                config.relay.issuer_secret.clone(),
            ),
            buffering: BufferingPolicy::from_flag(
                config.dispatch.buffer_request_content,
                config.dispatch.max_buffered_body_bytes,
            ),
            max_response_bytes: config.dispatch.max_response_body_bytes,
        })
    }
}

/// The relay gateway: one pipeline, one transport, at most one endpoint.
pub struct RelayGateway {
    settings: GatewaySettings,
    pipeline: Arc<dyn Pipeline>,
    transport: Arc<dyn RelayTransport>,
    endpoint: Option<Box<dyn RelayEndpoint>>,
}

impl RelayGateway {
    pub fn new(
        settings: GatewaySettings,
        pipeline: Arc<dyn Pipeline>,
        transport: Arc<dyn RelayTransport>,
    ) -> Self {
        Self {
            settings,
            pipeline,
            transport,
            endpoint: None,
        }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Socket of the open endpoint, if its transport has one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoint.as_ref().and_then(|e| e.local_addr())
    }

    /// Start accepting envelopes.
    pub async fn open(&mut self) -> Result<(), GatewayError> {
        if self.endpoint.is_some() {
            return Err(GatewayError::AlreadyOpen);
        }

        let dispatcher = Dispatcher::new(
            self.pipeline.clone(),
            self.settings.buffering,
            self.transport.repeated_values(),
        )
        .with_max_response_bytes(self.settings.max_response_bytes);
        let binding = EndpointBinding {
            address: self.settings.address.clone(),
            credentials: self.settings.credentials.clone(),
            handler: Arc::new(dispatcher),
        };

        let endpoint = self.transport.bind(binding).await?;
        tracing::info!(
            address = %self.settings.address,
            buffered = self.settings.buffering.is_buffered(),
            "Gateway open"
        );
        self.endpoint = Some(endpoint);
        Ok(())
    }

    /// Stop accepting envelopes and release the endpoint.
    pub async fn close(&mut self) -> Result<(), GatewayError> {
        let endpoint = self.endpoint.take().ok_or(GatewayError::NotOpen)?;
        endpoint.close().await?;
        tracing::info!(address = %self.settings.address, "Gateway closed");
        Ok(())
    }
}

impl std::fmt::Debug for RelayGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayGateway")
            .field("settings", &self.settings)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
