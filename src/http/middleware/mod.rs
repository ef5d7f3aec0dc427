//! Built-in pipeline stages.

pub mod routing;
pub mod signed_url;

pub use routing::RoutingMiddleware;
pub use signed_url::{SignedUrlMiddleware, SIGNED_MIDDLEWARE};
