//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::dispatch::DEFAULT_MAX_RESPONSE_BYTES;
use crate::http::request::DEFAULT_MAX_BUFFERED_BYTES;

/// Root configuration for the relay gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Relay endpoint address and issuer credentials.
    pub relay: RelayConfig,

    /// Local listener the HTTP relay transport serves from.
    pub listener: ListenerConfig,

    /// Request dispatch settings.
    pub dispatch: DispatchConfig,

    /// Local pipeline the gateway forwards to.
    pub pipeline: PipelineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Relay endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Public endpoint address (e.g., "sb://ns.relay.example/app").
    pub address: String,

    /// Issuer name handed to the transport.
    pub issuer_name: String,

    /// Issuer secret handed to the transport.
    #[serde(skip_serializing)]
    pub issuer_secret: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:8080/".to_string(),
            issuer_name: "owner".to_string(),
            issuer_secret: String::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum exchanges served at once (backpressure).
    pub max_concurrent_exchanges: usize,

    /// Exchanges running longer than this are canceled.
    pub exchange_timeout_secs: u64,

    /// Store repeated outbound header values comma-joined on one entry.
    pub join_repeated_headers: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_concurrent_exchanges: 10_000,
            exchange_timeout_secs: 60,
            join_repeated_headers: false,
        }
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Read request bodies into memory before forwarding them.
    pub buffer_request_content: bool,

    /// Largest request body accepted when buffering.
    pub max_buffered_body_bytes: usize,

    /// Largest pipeline response body held for one exchange.
    pub max_response_body_bytes: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            buffer_request_content: false,
            max_buffered_body_bytes: DEFAULT_MAX_BUFFERED_BYTES,
            max_response_body_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// Local pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Local server address (e.g., "127.0.0.1:3000").
    pub upstream_address: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upstream_address: "127.0.0.1:3000".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Full,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
