//! Relay envelopes.
//!
//! # Responsibilities
//! - Model the inbound call as the relay delivers it (method, matched
//!   target, header table, optional payload with a format hint)
//! - Model the outbound reply context (status, reason, append-only headers,
//!   suppress-body flag)
//!
//! # Design Decisions
//! - Method and target stay raw strings; validating them is translation's job
//! - The payload variant is the format hint
//! - How repeated outbound values are stored is a transport capability,
//!   fixed when the outbound envelope is created

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::{Bytes, BytesMut};

use crate::relay::structured::XmlElement;

/// Payload format as hinted by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Raw,
    Json,
    Structured,
}

/// Inbound payload.
pub enum Payload {
    /// Opaque bytes.
    Raw(Body),
    /// JSON bytes; handled exactly like `Raw`.
    Json(Body),
    /// Structured message that must be encoded before use.
    Structured(XmlElement),
}

impl Payload {
    pub fn format(&self) -> BodyFormat {
        match self {
            Payload::Raw(_) => BodyFormat::Raw,
            Payload::Json(_) => BodyFormat::Json,
            Payload::Structured(_) => BodyFormat::Structured,
        }
    }

    /// Turn the payload into a byte stream.
    pub fn into_body(self) -> Body {
        match self {
            Payload::Raw(body) | Payload::Json(body) => body,
            Payload::Structured(element) => Body::from(element.to_bytes()),
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Raw(_) => f.write_str("Raw(..)"),
            Payload::Json(_) => f.write_str("Json(..)"),
            Payload::Structured(element) => f.debug_tuple("Structured").field(element).finish(),
        }
    }
}

/// One call delivered by the relay transport.
#[derive(Debug)]
pub struct InboundEnvelope {
    /// HTTP method from the routing match.
    pub method: String,
    /// Matched target URI.
    pub target: String,
    /// Header table; repeated names keep every value.
    pub headers: HeaderMap,
    pub payload: Option<Payload>,
}

impl InboundEnvelope {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers: HeaderMap::new(),
            payload: None,
        }
    }

    /// Append a header value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// How an outbound header collection stores a repeated name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatedValues {
    /// Every append is its own entry.
    #[default]
    Separate,
    /// Later values are joined onto the first entry as `old,new`.
    CommaJoined,
}

/// Append-only header collection of an outbound envelope.
#[derive(Debug, Clone, Default)]
pub struct OutboundHeaders {
    entries: Vec<(HeaderName, HeaderValue)>,
    mode: RepeatedValues,
}

impl OutboundHeaders {
    pub fn new(mode: RepeatedValues) -> Self {
        Self {
            entries: Vec::new(),
            mode,
        }
    }

    pub fn mode(&self) -> RepeatedValues {
        self.mode
    }

    pub fn append(&mut self, name: HeaderName, value: HeaderValue) {
        if self.mode == RepeatedValues::CommaJoined {
            if let Some((_, existing)) = self.entries.iter_mut().find(|(n, _)| *n == name) {
                let mut joined = BytesMut::with_capacity(existing.len() + 1 + value.len());
                joined.extend_from_slice(existing.as_bytes());
                joined.extend_from_slice(b",");
                joined.extend_from_slice(value.as_bytes());
                // Both halves were valid header values, so the join is too.
                if let Ok(merged) = HeaderValue::from_maybe_shared(joined.freeze()) {
                    *existing = merged;
                    return;
                }
            }
        }
        self.entries.push((name, value));
    }

    /// Every value recorded under `name`, in append order.
    pub fn get_all(&self, name: &str) -> Vec<&HeaderValue> {
        self.entries
            .iter()
            .filter(|(n, _)| n.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.entries.iter().map(|(n, v)| (n, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reply context the transport sends back for one call.
#[derive(Debug, Clone)]
pub struct OutboundEnvelope {
    status: StatusCode,
    reason_phrase: String,
    headers: OutboundHeaders,
    suppress_body: bool,
}

impl OutboundEnvelope {
    pub fn new(mode: RepeatedValues) -> Self {
        Self {
            status: StatusCode::OK,
            reason_phrase: String::from("OK"),
            headers: OutboundHeaders::new(mode),
            suppress_body: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    pub fn set_reason_phrase(&mut self, reason: impl Into<String>) {
        self.reason_phrase = reason.into();
    }

    pub fn headers(&self) -> &OutboundHeaders {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut OutboundHeaders {
        &mut self.headers
    }

    pub fn suppress_body(&self) -> bool {
        self.suppress_body
    }

    pub fn set_suppress_body(&mut self, suppress: bool) {
        self.suppress_body = suppress;
    }
}

/// Final state of a completed exchange.
#[derive(Debug, Clone)]
pub struct OutboundReply {
    pub envelope: OutboundEnvelope,
    /// Complete response body; `None` when the body is suppressed.
    pub body: Option<Bytes>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom() -> HeaderName {
        HeaderName::from_static("x-customheader")
    }

    #[test]
    fn separate_mode_keeps_each_value() {
        let mut headers = OutboundHeaders::new(RepeatedValues::Separate);
        headers.append(custom(), HeaderValue::from_static("value1"));
        headers.append(custom(), HeaderValue::from_static("value2"));

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get_all("X-CustomHeader"), ["value1", "value2"]);
    }

    #[test]
    fn comma_joined_mode_merges_onto_first_entry() {
        let mut headers = OutboundHeaders::new(RepeatedValues::CommaJoined);
        headers.append(custom(), HeaderValue::from_static("value1"));
        headers.append(HeaderName::from_static("etag"), HeaderValue::from_static("\"12345678\""));
        headers.append(custom(), HeaderValue::from_static("value2"));

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get_all("x-customheader"), ["value1,value2"]);
        let names: Vec<_> = headers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["x-customheader", "etag"]);
    }

    #[test]
    fn structured_payload_becomes_bytes() {
        let payload = Payload::Structured(XmlElement::new("ping"));
        assert_eq!(payload.format(), BodyFormat::Structured);
        assert!(!crate::http::body::is_exhausted(&payload.into_body()));
    }

    #[test]
    fn outbound_defaults_to_ok() {
        let envelope = OutboundEnvelope::new(RepeatedValues::Separate);
        assert_eq!(envelope.status(), StatusCode::OK);
        assert_eq!(envelope.reason_phrase(), "OK");
        assert!(!envelope.suppress_body());
        assert!(envelope.headers().is_empty());
    }
}
