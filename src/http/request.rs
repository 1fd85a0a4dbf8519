//! Request translation.
//!
//! # Responsibilities
//! - Validate the envelope's method and target
//! - Partition the header table into transport and content headers
//! - Decode structured payloads and apply the buffering policy
//!
//! # Design Decisions
//! - Header values are copied as received; a value is never split on commas
//! - Buffering copies the whole body before returning, so the transport's
//!   stream is released as soon as translation finishes
//! - Streaming wraps the transport's stream without copying

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Uri};

use crate::http::body::{self, BufferError};
use crate::http::headers;
use crate::relay::envelope::InboundEnvelope;

/// Default ceiling for eagerly buffered request bodies.
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 4 * 1024 * 1024;

/// Whether request bodies are copied into memory before forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferingPolicy {
    /// Read the whole body eagerly, up to `max_bytes`.
    Buffered { max_bytes: usize },
    /// Hand the live transport stream downstream.
    #[default]
    Streaming,
}

impl BufferingPolicy {
    pub fn from_flag(buffer_request_content: bool, max_bytes: usize) -> Self {
        if buffer_request_content {
            BufferingPolicy::Buffered { max_bytes }
        } else {
            BufferingPolicy::Streaming
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, BufferingPolicy::Buffered { .. })
    }
}

/// Malformed inbound envelope.
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("envelope carries no method")]
    MissingMethod,

    #[error("invalid method {0:?}")]
    InvalidMethod(String),

    #[error("envelope carries no target URI")]
    MissingTarget,

    #[error("invalid target URI {target:?}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    #[error("request body exceeds the {limit} byte buffering limit")]
    BodyTooLarge { limit: usize },

    #[error("failed to buffer request body: {0}")]
    Body(#[source] axum::Error),
}

impl From<BufferError> for TranslationError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::TooLarge { limit } => TranslationError::BodyTooLarge { limit },
            BufferError::Read(e) => TranslationError::Body(e),
        }
    }
}

/// Transport-independent request handed to the local pipeline.
#[derive(Debug)]
pub struct CanonicalRequest {
    pub method: Method,
    pub uri: Uri,
    pub transport_headers: HeaderMap,
    pub content_headers: HeaderMap,
    pub body: Option<Body>,
    pub buffering: BufferingPolicy,
}

impl CanonicalRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            transport_headers: HeaderMap::new(),
            content_headers: HeaderMap::new(),
            body: None,
            buffering: BufferingPolicy::default(),
        }
    }

    /// Flatten into an `http::Request`, transport headers first.
    pub fn into_http(self) -> Request<Body> {
        let mut request = Request::new(self.body.unwrap_or_else(Body::empty));
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;

        let headers = request.headers_mut();
        for (name, value) in self.transport_headers.iter() {
            headers.append(name.clone(), value.clone());
        }
        for (name, value) in self.content_headers.iter() {
            headers.append(name.clone(), value.clone());
        }
        request
    }
}

/// Build a canonical request from an inbound envelope.
pub async fn translate_request(
    envelope: InboundEnvelope,
    policy: BufferingPolicy,
) -> Result<CanonicalRequest, TranslationError> {
    let InboundEnvelope {
        method,
        target,
        headers,
        payload,
    } = envelope;

    if method.is_empty() {
        return Err(TranslationError::MissingMethod);
    }
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| TranslationError::InvalidMethod(method.clone()))?;

    if target.is_empty() {
        return Err(TranslationError::MissingTarget);
    }
    let uri = target
        .parse::<Uri>()
        .map_err(|source| TranslationError::InvalidTarget {
            target: target.clone(),
            source,
        })?;

    let (transport_headers, content_headers) = headers::partition(&headers);

    let body = match payload {
        None => None,
        Some(payload) => {
            let format = payload.format();
            let stream = payload.into_body();
            let body = match policy {
                BufferingPolicy::Buffered { max_bytes } => {
                    let bytes = body::buffer(stream, max_bytes).await?;
                    tracing::trace!(?format, bytes = bytes.len(), "Request body buffered");
                    Body::from(bytes)
                }
                BufferingPolicy::Streaming => stream,
            };
            Some(body)
        }
    };

    Ok(CanonicalRequest {
        method,
        uri,
        transport_headers,
        content_headers,
        body,
        buffering: policy,
    })
}
