//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing / signing / pipeline produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters via the `metrics` facade)
//!
//! Consumers:
//!     → whatever subscriber / recorder the host installs
//! ```
//!
//! # Design Decisions
//! - The library only emits; binaries install the subscriber
//! - Metrics are cheap no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
