//! HTTP routing, middleware pipelines and signed URLs for a CMS host.
//!
//! # Architecture Overview
//!
//! ```text
//!   Boot (lifecycle)                         Request (http)
//!   ────────────────                         ──────────────
//!   RouteFile / cache file                   Host request
//!       │                                        │
//!       ▼                                        ▼
//!   RouteCollection ──freeze──▶ RouteSource ──▶ HttpKernel
//!       or                         │            ├─ RoutingMiddleware ──▶ UrlMatcher
//!   CachedRouteCollection          │            └─ RouteRunner
//!                                  │                 ├─ matched: priority-sorted
//!                                  │                 │  middleware ──▶ Controller
//!                                  │                 ├─ 405: Allow header
//!                                  │                 └─ 404: routeless middleware ──▶ host
//!                                  ▼
//!                            UrlGenerator ──▶ UrlSigner ──▶ SignedUrlStorage
//!                            (admin-area rewrite,           (memory / session / file,
//!                             signed routes)                 periodic GC)
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod pipeline;
pub mod routing;
pub mod signing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::RouterConfig;
pub use http::HttpKernel;
pub use lifecycle::{Application, Collaborators};
pub use routing::{RouteCollection, UrlGenerator, UrlMatcher};
pub use signing::UrlSigner;
