//! Body helpers shared by the translators and the dispatcher.

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;

/// Failure while collecting a body into memory.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("body read failed: {0}")]
    Read(#[source] axum::Error),
}

/// Read `body` to its end, refusing to hold more than `limit` bytes.
pub async fn buffer(mut body: Body, limit: usize) -> Result<Bytes, BufferError> {
    let mut buf = BytesMut::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(BufferError::Read)?;
        // Trailers carry nothing the canonical body keeps.
        if let Ok(data) = frame.into_data() {
            if buf.len() + data.len() > limit {
                return Err(BufferError::TooLarge { limit });
            }
            buf.extend_from_slice(&data);
        }
    }

    Ok(buf.freeze())
}

/// True when the body is known to carry no bytes at all.
pub fn is_exhausted(body: &Body) -> bool {
    http_body::Body::is_end_stream(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn buffer_collects_every_chunk() {
        let chunks: Vec<Result<&'static str, std::io::Error>> = vec![Ok("eu"), Ok("re"), Ok("ka")];
        let body = Body::from_stream(stream::iter(chunks));
        let bytes = buffer(body, 64).await.unwrap();
        assert_eq!(&bytes[..], b"eureka");
    }

    #[tokio::test]
    async fn buffer_enforces_limit() {
        let err = buffer(Body::from("0123456789"), 4).await.unwrap_err();
        assert!(matches!(err, BufferError::TooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn buffer_surfaces_read_failures() {
        let chunks: Vec<Result<&'static str, std::io::Error>> = vec![
            Ok("partial"),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let err = buffer(Body::from_stream(stream::iter(chunks)), 64).await.unwrap_err();
        assert!(matches!(err, BufferError::Read(_)));
    }

    #[test]
    fn empty_body_is_exhausted() {
        assert!(is_exhausted(&Body::empty()));
        assert!(!is_exhausted(&Body::from("x")));
    }
}
