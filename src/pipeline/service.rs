//! Tower service as a pipeline.
//!
//! Lets an in-process HTTP stack, such as an axum `Router`, serve as the
//! local pipeline without a socket in between.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::BoxError;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use tower::{Service, ServiceExt};

use crate::http::{CanonicalRequest, CanonicalResponse};
use crate::pipeline::{Pipeline, PipelineError};

/// Adapter from `Service<http::Request<Body>>` to [`Pipeline`].
#[derive(Debug, Clone)]
pub struct ServicePipeline<S> {
    inner: S,
}

impl<S> ServicePipeline<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, B> Pipeline for ServicePipeline<S>
where
    S: Service<Request<Body>, Response = Response<B>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    fn invoke(
        &self,
        request: CanonicalRequest,
    ) -> BoxFuture<'static, Result<CanonicalResponse, PipelineError>> {
        let service = self.inner.clone();
        Box::pin(async move {
            let response = service
                .oneshot(request.into_http())
                .await
                .map_err(PipelineError::invoke)?;
            Ok(CanonicalResponse::from_http(response))
        })
    }
}
