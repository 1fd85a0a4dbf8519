//! Per-exchange lifecycle objects.
//!
//! # Responsibilities
//! - Number exchanges in the order the transport delivered them
//! - Carry cancellation from the transport into the running exchange
//! - Resolve each exchange's completion exactly once
//! - Expose the exchange state machine to observers
//!
//! # State Machine
//! ```text
//! Received → Translating → Invoking → AwaitingBody → Completing
//!     → Completed | Faulted | Canceled
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{oneshot, watch};

use crate::http::TranslationError;
use crate::pipeline::PipelineError;
use crate::relay::envelope::OutboundReply;

/// Relaxed ordering is enough; ids only need to be unique.
static EXCHANGE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Position of an exchange in the call sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(u64);

impl ExchangeId {
    pub fn next() -> Self {
        Self(EXCHANGE_SEQUENCE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ex-{}", self.0)
    }
}

/// Where an exchange is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Received,
    Translating,
    Invoking,
    AwaitingBody,
    Completing,
    Completed,
    Faulted,
    Canceled,
}

impl ExchangeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExchangeState::Completed | ExchangeState::Faulted | ExchangeState::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeState::Received => "received",
            ExchangeState::Translating => "translating",
            ExchangeState::Invoking => "invoking",
            ExchangeState::AwaitingBody => "awaiting_body",
            ExchangeState::Completing => "completing",
            ExchangeState::Completed => "completed",
            ExchangeState::Faulted => "faulted",
            ExchangeState::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an exchange faulted.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeFault {
    #[error("malformed envelope: {0}")]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// How an exchange ended.
#[derive(Debug)]
pub enum ExchangeOutcome {
    Completed(OutboundReply),
    Faulted(ExchangeFault),
    Canceled,
}

impl ExchangeOutcome {
    pub fn state(&self) -> ExchangeState {
        match self {
            ExchangeOutcome::Completed(_) => ExchangeState::Completed,
            ExchangeOutcome::Faulted(_) => ExchangeState::Faulted,
            ExchangeOutcome::Canceled => ExchangeState::Canceled,
        }
    }

    pub fn label(&self) -> &'static str {
        self.state().as_str()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ExchangeOutcome::Completed(_))
    }

    pub fn into_reply(self) -> Option<OutboundReply> {
        match self {
            ExchangeOutcome::Completed(reply) => Some(reply),
            _ => None,
        }
    }
}

/// Create a linked cancel handle and signal.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelSignal { rx })
}

/// Requests cancellation of one exchange.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_canceled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observed by the running exchange at each suspension point.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_canceled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; never if every handle is
    /// dropped without canceling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// The single completion slot of an exchange.
///
/// The first `resolve` wins; later calls are ignored. Dropping an
/// unresolved completion resolves it as canceled.
#[derive(Debug)]
pub struct Completion {
    tx: Option<oneshot::Sender<ExchangeOutcome>>,
}

impl Completion {
    pub(crate) fn new() -> (Self, oneshot::Receiver<ExchangeOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Returns false if the completion was already resolved.
    pub fn resolve(&mut self, outcome: ExchangeOutcome) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // A dropped receiver means nobody waits; the outcome is moot.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.is_none()
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(ExchangeOutcome::Canceled);
        }
    }
}

/// Handle to one in-flight exchange.
///
/// Resolves to the exchange's outcome. Dropping it before then cancels the
/// exchange.
#[derive(Debug)]
pub struct Exchange {
    id: ExchangeId,
    outcome: oneshot::Receiver<ExchangeOutcome>,
    cancel: CancelHandle,
    state: watch::Receiver<ExchangeState>,
    finished: bool,
}

impl Exchange {
    pub(crate) fn new(
        id: ExchangeId,
        outcome: oneshot::Receiver<ExchangeOutcome>,
        cancel: CancelHandle,
        state: watch::Receiver<ExchangeState>,
    ) -> Self {
        Self {
            id,
            outcome,
            cancel,
            state,
            finished: false,
        }
    }

    pub fn id(&self) -> ExchangeId {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> ExchangeState {
        *self.state.borrow()
    }

    /// Receiver that follows every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ExchangeState> {
        self.state.clone()
    }
}

impl Future for Exchange {
    type Output = ExchangeOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match Pin::new(&mut self.outcome).poll(cx) {
            Poll::Pending => return Poll::Pending,
            // The completion resolves before it drops, so a closed channel
            // only happens if the task was torn down.
            Poll::Ready(outcome) => outcome.unwrap_or(ExchangeOutcome::Canceled),
        };
        self.finished = true;
        Poll::Ready(outcome)
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel.cancel();
        }
    }
}
