//! Pipeline that forwards to a local HTTP server.
//!
//! # Responsibilities
//! - Rewrite the canonical target onto the local server's authority
//! - Send the request with hyper-util's pooled client
//! - Convert the reply back into a canonical response
//!
//! # Design Decisions
//! - Only the connect timeout is enforced here; exchange timeouts belong
//!   to the relay transport
//! - Transport failures become `PipelineError::Invoke`, never a synthetic
//!   HTTP response

use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::Uri;
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::PipelineConfig;
use crate::http::{CanonicalRequest, CanonicalResponse};
use crate::pipeline::{Pipeline, PipelineError};

/// Forwards canonical requests to `upstream_address` over HTTP/1.1.
#[derive(Clone)]
pub struct UpstreamPipeline {
    authority: Authority,
    client: Client<HttpConnector, Body>,
}

impl UpstreamPipeline {
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let authority =
            Authority::from_str(&config.upstream_address).map_err(PipelineError::invoke)?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self { authority, client })
    }

    fn rewrite(&self, uri: Uri) -> Result<Uri, PipelineError> {
        let mut parts = uri.into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some("/".parse().map_err(PipelineError::invoke)?);
        }
        Uri::from_parts(parts).map_err(PipelineError::invoke)
    }
}

impl Pipeline for UpstreamPipeline {
    fn invoke(
        &self,
        request: CanonicalRequest,
    ) -> BoxFuture<'static, Result<CanonicalResponse, PipelineError>> {
        let client = self.client.clone();
        let uri = self.rewrite(request.uri.clone());

        Box::pin(async move {
            let mut request = request.into_http();
            *request.uri_mut() = uri?;

            tracing::debug!(
                method = %request.method(),
                uri = %request.uri(),
                "Forwarding to upstream"
            );

            let response = client.request(request).await.map_err(|e| {
                tracing::warn!(error = %e, "Upstream request failed");
                PipelineError::invoke(e)
            })?;

            Ok(CanonicalResponse::from_http(response))
        })
    }
}
