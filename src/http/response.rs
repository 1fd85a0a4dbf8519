//! Response translation.
//!
//! # Responsibilities
//! - Represent the pipeline's answer independently of any transport
//! - Write status, reason phrase and headers onto the outbound envelope
//!
//! # Design Decisions
//! - Status and reason phrase are copied verbatim
//! - No body means the outbound body is suppressed and no content header is
//!   written; the transport must not wait for or emit an empty body
//! - Transport headers go first, then content headers, one append per value

use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use axum::BoxError;
use bytes::Bytes;
use hyper::ext::ReasonPhrase;

use crate::http::body;
use crate::http::headers;
use crate::relay::envelope::OutboundEnvelope;

/// Transport-independent response produced by the local pipeline.
#[derive(Debug)]
pub struct CanonicalResponse {
    pub status: StatusCode,
    pub reason: String,
    pub transport_headers: HeaderMap,
    pub content_headers: HeaderMap,
    pub body: Option<Body>,
}

impl CanonicalResponse {
    /// Bodyless response carrying the status' canonical reason phrase.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            transport_headers: HeaderMap::new(),
            content_headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn no_body(&self) -> bool {
        self.body.is_none()
    }

    /// Split an `http::Response` into the canonical shape.
    pub fn from_http<B>(response: Response<B>) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = response.into_parts();
        let body = Body::new(body);

        let reason = parts
            .extensions
            .get::<ReasonPhrase>()
            .and_then(|phrase| std::str::from_utf8(phrase.as_bytes()).ok())
            .map(str::to_owned)
            .unwrap_or_else(|| parts.status.canonical_reason().unwrap_or_default().to_string());

        let (transport_headers, content_headers) = headers::partition(&parts.headers);

        let body = if forbids_body(parts.status)
            || (body::is_exhausted(&body) && content_headers.is_empty())
        {
            None
        } else {
            Some(body)
        };

        Self {
            status: parts.status,
            reason,
            transport_headers,
            content_headers,
            body,
        }
    }
}

fn forbids_body(status: StatusCode) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// Write `response` onto `outbound` and hand back the body still to be read.
pub fn translate_response(
    response: CanonicalResponse,
    outbound: &mut OutboundEnvelope,
) -> Option<Body> {
    let CanonicalResponse {
        status,
        reason,
        transport_headers,
        content_headers,
        body,
    } = response;

    outbound.set_status(status);
    outbound.set_reason_phrase(reason);

    for (name, value) in transport_headers.iter() {
        outbound.headers_mut().append(name.clone(), value.clone());
    }

    match body {
        None => {
            outbound.set_suppress_body(true);
            None
        }
        Some(body) => {
            for (name, value) in content_headers.iter() {
                outbound.headers_mut().append(name.clone(), value.clone());
            }
            Some(body)
        }
    }
}
