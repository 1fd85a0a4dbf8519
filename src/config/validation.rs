//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses (relay URL, socket addresses, upstream authority)
//! - Validate value ranges (timeouts and limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::config::schema::GatewayConfig;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("relay.address {0:?} is not a valid URL")]
    InvalidRelayAddress(String),

    #[error("relay.issuer_name must not be empty")]
    EmptyIssuerName,

    #[error("listener.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),

    #[error("listener.max_concurrent_exchanges must be greater than zero")]
    ZeroConcurrencyLimit,

    #[error("listener.exchange_timeout_secs must be greater than zero")]
    ZeroExchangeTimeout,

    #[error("dispatch.max_buffered_body_bytes must be greater than zero")]
    ZeroBufferLimit,

    #[error("dispatch.max_response_body_bytes must be greater than zero")]
    ZeroResponseLimit,

    #[error("pipeline.upstream_address {0:?} is not a host:port authority")]
    InvalidUpstreamAddress(String),

    #[error("pipeline.connect_timeout_secs must be greater than zero")]
    ZeroConnectTimeout,

    #[error("observability.log_level {0:?} is not a valid filter")]
    InvalidLogLevel(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let relay = &config.relay;
    if Url::parse(&relay.address).is_err() {
        errors.push(ValidationError::InvalidRelayAddress(relay.address.clone()));
    }
    if relay.issuer_name.trim().is_empty() {
        errors.push(ValidationError::EmptyIssuerName);
    }

    let listener = &config.listener;
    if listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(listener.bind_address.clone()));
    }
    if listener.max_concurrent_exchanges == 0 {
        errors.push(ValidationError::ZeroConcurrencyLimit);
    }
    if listener.exchange_timeout_secs == 0 {
        errors.push(ValidationError::ZeroExchangeTimeout);
    }

    if config.dispatch.max_buffered_body_bytes == 0 {
        errors.push(ValidationError::ZeroBufferLimit);
    }
    if config.dispatch.max_response_body_bytes == 0 {
        errors.push(ValidationError::ZeroResponseLimit);
    }

    let pipeline = &config.pipeline;
    let authority = Authority::from_str(&pipeline.upstream_address);
    if !authority.is_ok_and(|a| a.port_u16().is_some()) {
        errors.push(ValidationError::InvalidUpstreamAddress(
            pipeline.upstream_address.clone(),
        ));
    }
    if pipeline.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }

    let observability = &config.observability;
    if EnvFilter::try_new(&observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
