//! HTTP request handling subsystem.
//!
//! # Data Flow
//! ```text
//! Host request
//!     → kernel.rs (fresh Pipeline per request)
//!     → middleware/routing.rs (admin rewrite, dispatch, attach MatchResult)
//!     → pipeline::runner (route middleware + controller, or routeless + host)
//!     → response.rs (normalize controller output)
//!     → Response back to the host
//! ```

pub mod kernel;
pub mod middleware;
pub mod request;
pub mod response;

pub use kernel::HttpKernel;
pub use request::{RequestExt, RequestHead};
pub use response::{ControllerOutput, DefaultResponseNormalizer, HttpError, ResponseNormalizer};
