//! Middleware pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Route / global / controller declarations ("id:arg1,arg2")
//!     → blueprint.rs (parse, coerce arguments)
//!     → priority.rs (expand groups, dedupe, priority sort)
//!     → chain.rs (single-use Pipeline: send → through → then)
//!     → middleware.rs (Next delegates link by link; factory builds
//!       instances per request; failures translated at their link)
//!     → runner.rs (controller call + response normalization)
//! ```
//!
//! # Design Decisions
//! - Pipelines are synchronous; middleware never awaits
//! - A failure is translated exactly once, where it happened, and later
//!   links never run

pub mod blueprint;
pub mod chain;
pub mod errors;
pub mod middleware;
pub mod priority;
pub mod runner;

pub use blueprint::{MiddlewareArg, MiddlewareBlueprint};
pub use chain::{Pipeline, PipelineState};
pub use errors::{DefaultErrorTranslator, ErrorTranslator, PipelineError};
pub use middleware::{
    from_fn, BoxError, Middleware, MiddlewareFactory, MiddlewareRegistry, Next, Pipe, PipelineServices,
};
pub use priority::MiddlewareResolver;
pub use runner::{Controller, ControllerRegistry, ControllerResolver, RouteRunner};
