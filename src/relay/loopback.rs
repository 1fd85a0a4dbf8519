//! In-process relay transport.
//!
//! Delivers envelopes straight to the bound handler without a network in
//! between. Callers may `send` from many tasks at once; every call gets its
//! own exchange.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::BoxFuture;
use url::Url;

use crate::dispatch::Exchange;
use crate::relay::envelope::{InboundEnvelope, RepeatedValues};
use crate::relay::transport::{
    EndpointBinding, EnvelopeHandler, RelayEndpoint, RelayTransport, TransportError,
};

struct Bound {
    address: Url,
    handler: Arc<dyn EnvelopeHandler>,
}

#[derive(Default)]
struct Slot {
    bound: Mutex<Option<Bound>>,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, Option<Bound>> {
        // The slot holds no invariant a panicking holder could break.
        self.bound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Loopback transport with a single endpoint slot.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    slot: Arc<Slot>,
    repeated_values: RepeatedValues,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loopback whose outbound headers behave like `mode`.
    pub fn with_repeated_values(mode: RepeatedValues) -> Self {
        Self {
            slot: Arc::default(),
            repeated_values: mode,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Deliver one envelope to the bound handler.
    ///
    /// The handler runs outside the slot lock, so overlapping sends never
    /// wait on each other.
    pub fn send(&self, envelope: InboundEnvelope) -> Result<Exchange, TransportError> {
        let handler = match self.slot.lock().as_ref() {
            Some(bound) => bound.handler.clone(),
            None => return Err(TransportError::NotBound),
        };
        Ok(handler.handle(envelope))
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("bound", &self.is_bound())
            .field("repeated_values", &self.repeated_values)
            .finish()
    }
}

impl RelayTransport for LoopbackTransport {
    fn repeated_values(&self) -> RepeatedValues {
        self.repeated_values
    }

    fn bind(
        &self,
        binding: EndpointBinding,
    ) -> BoxFuture<'_, Result<Box<dyn RelayEndpoint>, TransportError>> {
        Box::pin(async move {
            let mut bound = self.slot.lock();
            if let Some(existing) = bound.as_ref() {
                return Err(TransportError::AlreadyBound(existing.address.clone()));
            }

            tracing::info!(
                address = %binding.address,
                issuer = binding.credentials.issuer_name(),
                "Loopback endpoint bound"
            );
            *bound = Some(Bound {
                address: binding.address,
                handler: binding.handler,
            });

            Ok(Box::new(LoopbackEndpoint {
                slot: self.slot.clone(),
            }) as Box<dyn RelayEndpoint>)
        })
    }
}

struct LoopbackEndpoint {
    slot: Arc<Slot>,
}

impl RelayEndpoint for LoopbackEndpoint {
    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), TransportError>> {
        Box::pin(async move {
            // Exchanges already handed out keep running to completion.
            match self.slot.lock().take() {
                Some(bound) => {
                    tracing::info!(address = %bound.address, "Loopback endpoint closed");
                    Ok(())
                }
                None => Err(TransportError::NotBound),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::http::{BufferingPolicy, CanonicalRequest, CanonicalResponse};
    use crate::pipeline::{pipeline_fn, PipelineError};
    use crate::relay::credentials::IssuerCredentials;
    use axum::http::StatusCode;

    fn binding() -> EndpointBinding {
        let pipeline = pipeline_fn(|_req: CanonicalRequest| async {
            Ok::<_, PipelineError>(CanonicalResponse::new(StatusCode::OK).with_body("eureka"))
        });
        EndpointBinding {
            address: Url::parse("sb://ns.relay.example/app").unwrap(),
            credentials: IssuerCredentials::new("owner", "secret"),
            handler: Arc::new(Dispatcher::new(
                Arc::new(pipeline),
                BufferingPolicy::Streaming,
                RepeatedValues::Separate,
            )),
        }
    }

    #[tokio::test]
    async fn send_requires_a_bound_endpoint() {
        let transport = LoopbackTransport::new();
        let result = transport.send(InboundEnvelope::new("GET", "sb://ns.relay.example/app"));
        assert!(matches!(result, Err(TransportError::NotBound)));
    }

    #[tokio::test]
    async fn bound_endpoint_delivers_envelopes() {
        let transport = LoopbackTransport::new();
        let endpoint = transport.bind(binding()).await.unwrap();
        assert!(transport.is_bound());

        let exchange = transport
            .send(InboundEnvelope::new("GET", "sb://ns.relay.example/app/test"))
            .unwrap();
        let reply = exchange.await.into_reply().unwrap();
        assert_eq!(reply.body.as_deref(), Some(&b"eureka"[..]));

        endpoint.close().await.unwrap();
        assert!(!transport.is_bound());
    }

    #[tokio::test]
    async fn second_bind_is_rejected() {
        let transport = LoopbackTransport::new();
        let _endpoint = transport.bind(binding()).await.unwrap();

        let result = transport.bind(binding()).await;
        assert!(matches!(result, Err(TransportError::AlreadyBound(_))));
    }

    #[test]
    fn declares_its_repeated_value_mode() {
        let transport = LoopbackTransport::with_repeated_values(RepeatedValues::CommaJoined);
        assert_eq!(transport.repeated_values(), RepeatedValues::CommaJoined);
    }
}
