//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     Route::new (pattern.rs compiles, validates)
//!     → collection.rs (unique names, registration order)
//!     → freeze
//!     → cache.rs (optional: write name -> serialized route artifact)
//!
//! Boot from cache:
//!     cache.rs (load, check shape)
//!     → CachedRouteCollection (lazy, verified hydration)
//!
//! Incoming Request (method, path):
//!     → area.rs (admin area rewrite for routing)
//!     → matcher.rs (evaluate patterns)
//!     → Return: Matched / MethodNotAllowed / NotFound
//!
//! Reverse routing:
//!     name + params → generator.rs → path (+ admin rewrite, + signature)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at registration, immutable once the collection is frozen
//! - No regex in the hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod area;
pub mod cache;
pub mod collection;
pub mod error;
pub mod generator;
pub mod matcher;
pub mod pattern;
pub mod route;

pub use area::{AdminArea, WpAdminArea};
pub use collection::{CachedRouteCollection, RouteCollection, RouteSource};
pub use error::{CacheCorrupted, DefinitionError, RoutingError, RoutingResult};
pub use generator::{GenerationError, UrlGenerationContext, UrlGenerator};
pub use matcher::{MatchResult, RouteMatch, UrlMatcher};
pub use pattern::CompiledPattern;
pub use route::{ControllerRef, Requirement, Route};
