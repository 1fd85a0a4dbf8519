//! HTTP translation subsystem.
//!
//! # Data Flow
//! ```text
//! InboundEnvelope
//!     → headers.rs (classify every name: transport or content)
//!     → request.rs (CanonicalRequest, buffering policy)
//!     → [pipeline invoke]
//!     → response.rs (CanonicalResponse → OutboundEnvelope)
//!     → body.rs (read the response body)
//! ```

pub mod body;
pub mod headers;
pub mod request;
pub mod response;

pub use headers::{classify, HeaderClassification, CONTENT_HEADERS};
pub use request::{translate_request, BufferingPolicy, CanonicalRequest, TranslationError};
pub use response::{translate_response, CanonicalResponse};
