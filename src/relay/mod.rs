//! Relay transport subsystem.
//!
//! # Data Flow
//! ```text
//! relay transport (loopback.rs | http_transport.rs)
//!     → envelope.rs (InboundEnvelope, payload format hint)
//!     → transport.rs (EnvelopeHandler: the dispatcher)
//!     → envelope.rs (OutboundEnvelope, OutboundReply)
//!     → back to the transport
//! ```
//!
//! # Design Decisions
//! - The gateway sees transports only through `RelayTransport` and
//!   `RelayEndpoint`
//! - Credentials pass through untouched (credentials.rs)
//! - Structured payloads are XML trees encoded on demand (structured.rs)

pub mod credentials;
pub mod envelope;
pub mod http_transport;
pub mod loopback;
pub mod structured;
pub mod transport;

pub use credentials::IssuerCredentials;
pub use envelope::{
    BodyFormat, InboundEnvelope, OutboundEnvelope, OutboundHeaders, OutboundReply, Payload,
    RepeatedValues,
};
pub use http_transport::HttpRelayTransport;
pub use loopback::LoopbackTransport;
pub use structured::{XmlElement, XmlNode};
pub use transport::{
    EndpointBinding, EnvelopeHandler, RelayEndpoint, RelayTransport, TransportError,
};
