//! Header classification.
//!
//! # Responsibilities
//! - Decide whether a header describes the body representation (content)
//!   or the call itself (transport)
//! - Split a header table into the two canonical multimaps
//!
//! # Design Decisions
//! - Fixed name set, case-insensitive lookup, no state
//! - Repeated values are appended, never merged

use axum::http::HeaderMap;

/// Header names that travel with the body representation.
pub const CONTENT_HEADERS: [&str; 10] = [
    "Allow",
    "Content-Encoding",
    "Content-Language",
    "Content-Length",
    "Content-Location",
    "Content-MD5",
    "Content-Range",
    "Content-Type",
    "Expires",
    "Last-Modified",
];

/// Where a header belongs on a canonical request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderClassification {
    /// Routing and call metadata (custom headers, `Accept`, auth...).
    Transport,
    /// Describes the body (`Content-Type`, `Content-Length`...).
    Content,
}

/// Classify a header name.
pub fn classify(name: &str) -> HeaderClassification {
    if CONTENT_HEADERS
        .iter()
        .any(|content| content.eq_ignore_ascii_case(name))
    {
        HeaderClassification::Content
    } else {
        HeaderClassification::Transport
    }
}

/// Split `headers` into `(transport, content)` multimaps, keeping every value.
pub fn partition(headers: &HeaderMap) -> (HeaderMap, HeaderMap) {
    let mut transport = HeaderMap::new();
    let mut content = HeaderMap::new();

    for (name, value) in headers.iter() {
        let target = match classify(name.as_str()) {
            HeaderClassification::Transport => &mut transport,
            HeaderClassification::Content => &mut content,
        };
        target.append(name.clone(), value.clone());
    }

    (transport, content)
}
