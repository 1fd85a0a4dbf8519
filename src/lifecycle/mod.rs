//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Open (gateway.rs):
//!     Build dispatcher → Bind endpoint with credentials → Accept envelopes
//!
//! Close (gateway.rs):
//!     Release endpoint → transport decides the fate of in-flight exchanges
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary closes the gateway
//! ```

pub mod gateway;
pub mod signals;

pub use gateway::{GatewayError, GatewaySettings, RelayGateway};
pub use signals::shutdown_signal;
