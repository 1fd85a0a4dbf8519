//! Local HTTP pipeline contract.
//!
//! # Responsibilities
//! - Define `invoke(request) -> future<response>`, the only way the gateway
//!   talks to the local request-processing pipeline
//! - Adapt closures, tower services and a local upstream server to it
//!
//! # Design Decisions
//! - Failures surface through the returned future, never synchronously
//! - Implementations are shared across concurrent exchanges (`Send + Sync`)

pub mod service;
pub mod upstream;

use std::future::Future;

use axum::BoxError;
use futures_util::future::BoxFuture;

use crate::http::{CanonicalRequest, CanonicalResponse};

pub use service::ServicePipeline;
pub use upstream::UpstreamPipeline;

/// Failure raised by the pipeline or while reading its response body.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline invocation failed: {0}")]
    Invoke(#[source] BoxError),

    #[error("reading the pipeline response body failed: {0}")]
    Body(#[source] BoxError),
}

impl PipelineError {
    pub fn invoke(err: impl Into<BoxError>) -> Self {
        PipelineError::Invoke(err.into())
    }

    pub fn body(err: impl Into<BoxError>) -> Self {
        PipelineError::Body(err.into())
    }
}

/// The local request-processing pipeline.
pub trait Pipeline: Send + Sync + 'static {
    fn invoke(
        &self,
        request: CanonicalRequest,
    ) -> BoxFuture<'static, Result<CanonicalResponse, PipelineError>>;
}

/// Pipeline backed by an async closure.
pub struct FnPipeline<F> {
    f: F,
}

/// Wrap `f` as a [`Pipeline`].
pub fn pipeline_fn<F, Fut>(f: F) -> FnPipeline<F>
where
    F: Fn(CanonicalRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CanonicalResponse, PipelineError>> + Send + 'static,
{
    FnPipeline { f }
}

impl<F, Fut> Pipeline for FnPipeline<F>
where
    F: Fn(CanonicalRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CanonicalResponse, PipelineError>> + Send + 'static,
{
    fn invoke(
        &self,
        request: CanonicalRequest,
    ) -> BoxFuture<'static, Result<CanonicalResponse, PipelineError>> {
        Box::pin((self.f)(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode, Uri};

    #[tokio::test]
    async fn closure_pipeline_forwards_result() {
        let pipeline = pipeline_fn(|request: CanonicalRequest| async move {
            assert_eq!(request.method, Method::DELETE);
            Ok::<_, PipelineError>(CanonicalResponse::new(StatusCode::ACCEPTED))
        });

        let request =
            CanonicalRequest::new(Method::DELETE, Uri::from_static("http://relay.example/"));
        let response = pipeline.invoke(request).await.unwrap();

        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert_eq!(response.reason, "Accepted");
    }

    #[test]
    fn error_messages_name_the_failing_step() {
        let err = PipelineError::invoke("boom");
        assert_eq!(err.to_string(), "pipeline invocation failed: boom");
        let err = PipelineError::body("reset");
        assert!(err.to_string().contains("response body"));
    }
}
