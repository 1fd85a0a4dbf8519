//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch orchestrator and transports produce:
//!     → logging.rs (structured log events, one span per exchange)
//!     → metrics.rs (exchange counters, latency histogram, in-flight gauge)
//!
//! Consumers:
//!     → stdout (compact or full format)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use self::logging::init_logging;
pub use self::metrics::init_metrics;
