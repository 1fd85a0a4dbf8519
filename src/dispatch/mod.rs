//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! InboundEnvelope
//!     → orchestrator.rs (Dispatcher::dispatch spawns one task per exchange)
//!         Translating → Invoking → AwaitingBody → Completing
//!     → exchange.rs (Completion resolves exactly once)
//!     → Exchange future → ExchangeOutcome
//! ```
//!
//! # Design Decisions
//! - The dispatcher is shared by every exchange and holds no mutable state
//! - Cancellation is a signal threaded into the exchange, not an error
//! - No retries; retry policy belongs to the transport or the pipeline

pub mod exchange;
pub mod orchestrator;

pub use exchange::{
    cancellation, CancelHandle, CancelSignal, Completion, Exchange, ExchangeFault, ExchangeId,
    ExchangeOutcome, ExchangeState,
};
pub use orchestrator::{Dispatcher, DEFAULT_MAX_RESPONSE_BYTES};
