//! Relay Gateway Library
//!
//! Lets a local HTTP pipeline be reached through a relay transport that
//! delivers requests as envelopes instead of socket connections.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod relay;

pub use config::GatewayConfig;
pub use dispatch::{Dispatcher, Exchange, ExchangeOutcome};
pub use lifecycle::{GatewaySettings, RelayGateway};
pub use pipeline::Pipeline;
