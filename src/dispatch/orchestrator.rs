//! Dispatch orchestration.
//!
//! # Responsibilities
//! - Accept envelopes from the transport without blocking it
//! - Drive each exchange through translation, invocation and body reading
//! - Resolve the exchange's completion with the final outbound state
//!
//! # Design Decisions
//! - One shared, cloneable dispatcher holds only immutable configuration;
//!   everything mutable lives in the spawned exchange task
//! - Cancellation is checked at every suspension point and every body frame
//! - Pipeline and body failures fault the exchange, panics included; no
//!   substitute response is ever synthesized
//! - The body is read completely, up to a size limit, before completion so
//!   a failure halfway through never yields a partial reply

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures_util::FutureExt;
use http_body_util::BodyExt;
use tokio::sync::watch;
use tracing::Instrument;

use crate::dispatch::exchange::{
    cancellation, CancelSignal, Completion, Exchange, ExchangeFault, ExchangeId, ExchangeOutcome,
    ExchangeState,
};
use crate::http::body::BufferError;
use crate::http::{translate_request, translate_response, BufferingPolicy};
use crate::observability::metrics;
use crate::pipeline::{Pipeline, PipelineError};
use crate::relay::envelope::{InboundEnvelope, OutboundEnvelope, OutboundReply, RepeatedValues};

/// Default ceiling for a pipeline response body held by one exchange.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// The shared dispatch orchestrator.
#[derive(Clone)]
pub struct Dispatcher {
    pipeline: Arc<dyn Pipeline>,
    buffering: BufferingPolicy,
    repeated_values: RepeatedValues,
    max_response_bytes: usize,
}

impl Dispatcher {
    pub fn new(
        pipeline: Arc<dyn Pipeline>,
        buffering: BufferingPolicy,
        repeated_values: RepeatedValues,
    ) -> Self {
        Self {
            pipeline,
            buffering,
            repeated_values,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Fault exchanges whose response body grows past `limit` bytes.
    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    pub fn buffering(&self) -> BufferingPolicy {
        self.buffering
    }

    /// Start an exchange for `envelope` and return its handle immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, envelope: InboundEnvelope) -> Exchange {
        let id = ExchangeId::next();
        let (cancel, signal) = cancellation();
        let (completion, outcome) = Completion::new();
        let (state_tx, state_rx) = watch::channel(ExchangeState::Received);

        let span = tracing::info_span!(
            "exchange",
            id = %id,
            method = %envelope.method,
            target = %envelope.target,
        );
        tracing::debug!(parent: &span, "Envelope received");

        let task = ExchangeTask {
            pipeline: self.pipeline.clone(),
            buffering: self.buffering,
            repeated_values: self.repeated_values,
            max_response_bytes: self.max_response_bytes,
            state: state_tx,
        };
        tokio::spawn(task.run(envelope, signal, completion).instrument(span));

        Exchange::new(id, outcome, cancel, state_rx)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("buffering", &self.buffering)
            .field("repeated_values", &self.repeated_values)
            .field("max_response_bytes", &self.max_response_bytes)
            .finish_non_exhaustive()
    }
}

/// Exchange-local state.
struct ExchangeTask {
    pipeline: Arc<dyn Pipeline>,
    buffering: BufferingPolicy,
    repeated_values: RepeatedValues,
    max_response_bytes: usize,
    state: watch::Sender<ExchangeState>,
}

impl ExchangeTask {
    async fn run(
        self,
        envelope: InboundEnvelope,
        cancel: CancelSignal,
        mut completion: Completion,
    ) {
        let started = Instant::now();
        let _in_flight = metrics::InFlightGuard::new();

        let outcome = self.drive(envelope, cancel).await;

        let status = match &outcome {
            ExchangeOutcome::Completed(reply) => Some(reply.envelope.status().as_u16()),
            _ => None,
        };
        match &outcome {
            ExchangeOutcome::Completed(_) => {
                tracing::debug!(status, elapsed = ?started.elapsed(), "Exchange completed")
            }
            ExchangeOutcome::Faulted(fault) => {
                tracing::warn!(error = %fault, elapsed = ?started.elapsed(), "Exchange faulted")
            }
            ExchangeOutcome::Canceled => {
                tracing::info!(elapsed = ?started.elapsed(), "Exchange canceled")
            }
        }
        metrics::record_exchange(outcome.label(), status, started);

        self.enter(outcome.state());
        completion.resolve(outcome);
    }

    async fn drive(&self, envelope: InboundEnvelope, mut cancel: CancelSignal) -> ExchangeOutcome {
        self.enter(ExchangeState::Translating);
        let request = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ExchangeOutcome::Canceled,
            translated = translate_request(envelope, self.buffering) => match translated {
                Ok(request) => request,
                Err(e) => return ExchangeOutcome::Faulted(e.into()),
            },
        };

        self.enter(ExchangeState::Invoking);
        let invocation = match std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.pipeline.invoke(request)
        })) {
            Ok(invocation) => AssertUnwindSafe(invocation).catch_unwind(),
            Err(panic) => return pipeline_panicked(panic, |m| PipelineError::invoke(m)),
        };
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ExchangeOutcome::Canceled,
            invoked = invocation => match invoked {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return ExchangeOutcome::Faulted(e.into()),
                Err(panic) => return pipeline_panicked(panic, |m| PipelineError::invoke(m)),
            },
        };

        self.enter(ExchangeState::AwaitingBody);
        let mut outbound = OutboundEnvelope::new(self.repeated_values);
        let body = match translate_response(response, &mut outbound) {
            None => None,
            Some(body) => {
                let read = read_body(body, &mut cancel, self.max_response_bytes);
                match AssertUnwindSafe(read).catch_unwind().await {
                    Ok(Ok(bytes)) => Some(bytes),
                    Ok(Err(BodyInterrupted::Canceled)) => return ExchangeOutcome::Canceled,
                    Ok(Err(BodyInterrupted::Failed(e))) => {
                        return ExchangeOutcome::Faulted(ExchangeFault::Pipeline(e))
                    }
                    Err(panic) => return pipeline_panicked(panic, |m| PipelineError::body(m)),
                }
            }
        };

        self.enter(ExchangeState::Completing);
        ExchangeOutcome::Completed(OutboundReply {
            envelope: outbound,
            body,
        })
    }

    fn enter(&self, state: ExchangeState) {
        tracing::trace!(state = %state, "Exchange state");
        self.state.send_replace(state);
    }
}

/// A panic inside the pipeline is a pipeline fault, never a cancellation.
fn pipeline_panicked(
    panic: Box<dyn Any + Send>,
    into_error: fn(String) -> PipelineError,
) -> ExchangeOutcome {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %message, "Pipeline panicked");
    ExchangeOutcome::Faulted(ExchangeFault::Pipeline(into_error(format!(
        "pipeline panicked: {message}"
    ))))
}

enum BodyInterrupted {
    Canceled,
    Failed(PipelineError),
}

/// Read the pipeline's body frame by frame, stopping at cancellation or
/// once it grows past `limit` bytes.
async fn read_body(
    mut body: Body,
    cancel: &mut CancelSignal,
    limit: usize,
) -> Result<Bytes, BodyInterrupted> {
    let mut buf = BytesMut::new();

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BodyInterrupted::Canceled),
            frame = body.frame() => frame,
        };

        match frame {
            None => break,
            Some(Err(e)) => return Err(BodyInterrupted::Failed(PipelineError::body(e))),
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    if buf.len() + data.len() > limit {
                        let err = BufferError::TooLarge { limit };
                        return Err(BodyInterrupted::Failed(PipelineError::body(err)));
                    }
                    buf.extend_from_slice(&data);
                }
            }
        }
    }

    Ok(buf.freeze())
}
