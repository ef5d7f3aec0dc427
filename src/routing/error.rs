//! Routing error definitions.
//!
//! # Design Decisions
//! - Definition errors are fatal to startup and surface at registration time
//! - Cache corruption is its own type so callers can never mistake it for a miss
//! - No-match and method-not-allowed are NOT errors (see `matcher::MatchResult`)

use thiserror::Error;

/// Errors raised while registering routes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// The pattern could not be compiled.
    #[error("Invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A route with this name is already registered.
    #[error("Route name `{0}` is already registered")]
    DuplicateName(String),

    /// The collection no longer accepts routes.
    #[error("Route collection is frozen, cannot add `{0}`")]
    CollectionFrozen(String),

    /// The route was already given a name.
    #[error("Route `{0}` already has a name")]
    NameAlreadyAssigned(String),

    /// A default or requirement references a segment the pattern doesn't have.
    #[error("Segment `{segment}` does not exist in pattern `{pattern}`")]
    UnknownSegment { pattern: String, segment: String },

    /// A method string is not a valid HTTP method token.
    #[error("Invalid HTTP method `{0}`")]
    InvalidMethod(String),

    /// A controller reference is not `Controller@action`.
    #[error("Invalid controller reference `{0}`")]
    InvalidController(String),

    /// A middleware declaration could not be parsed.
    #[error("Invalid middleware declaration `{0}`")]
    InvalidMiddleware(String),

    /// Middleware groups reference each other in a loop.
    #[error("Middleware group `{0}` expands into itself")]
    MiddlewareGroupCycle(String),
}

/// A persisted route cannot be trusted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheCorrupted {
    /// The route stored under `expected` claims to be named `stored`.
    #[error("Route cache corrupted: entry `{expected}` holds route named `{stored}`")]
    NameMismatch { expected: String, stored: String },

    /// The stored value under `key` is not a serialized route.
    #[error("Route cache corrupted: entry `{key}` is invalid: {reason}")]
    InvalidEntry { key: String, reason: String },

    /// The artifact is not a name -> serialized route mapping at all.
    #[error("Route cache corrupted: {0}")]
    InvalidShape(String),
}

/// Errors that can occur while looking up or generating routes.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    CacheCorrupted(#[from] CacheCorrupted),

    /// No route is registered under the name.
    #[error("Route `{0}` not found")]
    RouteNotFound(String),

    /// A required segment has neither a value nor a default.
    #[error("Missing parameter `{parameter}` for route `{route}`")]
    MissingRouteParameter { route: String, parameter: String },

    /// A supplied value violates the segment's requirement.
    #[error("Parameter `{parameter}` for route `{route}` does not satisfy its requirement: `{value}`")]
    InvalidParameter {
        route: String,
        parameter: String,
        value: String,
    },

    /// Reading or writing the cache artifact failed.
    #[error("Route cache IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RoutingResult<T> = Result<T, RoutingError>;
