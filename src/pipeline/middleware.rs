//! Middleware capability and the delegate chain.
//!
//! # Responsibilities
//! - Define the single-method `Middleware` capability
//! - Provide `Next`, the delegate that invokes the rest of the chain
//! - Resolve blueprints into fresh instances through a `MiddlewareFactory`
//! - Translate a failure at the link where it happened, exactly once
//!
//! # Design Decisions
//! - Middleware instances built from blueprints live for one request only
//! - `Next::run` always returns a response: errors never escape a link
//! - Arguments are coerced when the factory is asked, not at registration

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use thiserror::Error;

use crate::http::request::RequestHead;
use crate::observability::metrics;
use crate::pipeline::blueprint::{MiddlewareArg, MiddlewareBlueprint};
use crate::pipeline::errors::ErrorTranslator;

/// Error type raised by middleware and controllers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Innermost handler of a pipeline.
pub type Terminal<'a> = &'a dyn Fn(Request<Body>) -> Result<Response, BoxError>;

/// A pipeline stage.
pub trait Middleware: Send + Sync {
    /// Either call `next.run(request)` (and optionally post-process its
    /// response) or short-circuit with a response of its own.
    fn process(&self, request: Request<Body>, next: Next<'_>) -> Result<Response, BoxError>;
}

/// Middleware built from a closure.
pub struct FnMiddleware<F>(F);

/// Wrap a closure as middleware.
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(Request<Body>, Next<'_>) -> Result<Response, BoxError> + Send + Sync,
{
    FnMiddleware(f)
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Request<Body>, Next<'_>) -> Result<Response, BoxError> + Send + Sync,
{
    fn process(&self, request: Request<Body>, next: Next<'_>) -> Result<Response, BoxError> {
        (self.0)(request, next)
    }
}

/// Builds middleware instances from identifiers and coerced arguments.
pub trait MiddlewareFactory: Send + Sync {
    fn create(&self, id: &str, args: &[MiddlewareArg]) -> Result<Box<dyn Middleware>, BoxError>;
}

/// The factory was asked for an identifier nobody registered.
#[derive(Debug, Error)]
#[error("No middleware registered as `{0}`")]
pub struct UnknownMiddleware(pub String);

type Constructor = Box<dyn Fn(&[MiddlewareArg]) -> Result<Box<dyn Middleware>, BoxError> + Send + Sync>;

/// Tagged lookup: identifier -> constructor function.
#[derive(Default)]
pub struct MiddlewareRegistry {
    constructors: HashMap<String, Constructor>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor. A later registration replaces an earlier one.
    pub fn register<F>(&mut self, id: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&[MiddlewareArg]) -> Result<Box<dyn Middleware>, BoxError> + Send + Sync + 'static,
    {
        self.constructors.insert(id.into(), Box::new(constructor));
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.constructors.keys().collect();
        ids.sort();
        f.debug_struct("MiddlewareRegistry").field("ids", &ids).finish()
    }
}

impl MiddlewareFactory for MiddlewareRegistry {
    fn create(&self, id: &str, args: &[MiddlewareArg]) -> Result<Box<dyn Middleware>, BoxError> {
        let constructor = self
            .constructors
            .get(id)
            .ok_or_else(|| UnknownMiddleware(id.to_string()))?;
        constructor(args)
    }
}

/// One link of a pipeline: a blueprint resolved per request, or a shared instance.
#[derive(Clone)]
pub enum Pipe {
    Blueprint(MiddlewareBlueprint),
    Instance(Arc<dyn Middleware>),
}

impl Pipe {
    fn label(&self) -> String {
        match self {
            Pipe::Blueprint(bp) => bp.id.clone(),
            Pipe::Instance(_) => "instance".to_string(),
        }
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipe::Blueprint(bp) => write!(f, "Pipe::Blueprint({})", bp),
            Pipe::Instance(_) => f.write_str("Pipe::Instance(..)"),
        }
    }
}

impl From<MiddlewareBlueprint> for Pipe {
    fn from(bp: MiddlewareBlueprint) -> Self {
        Pipe::Blueprint(bp)
    }
}

impl From<Arc<dyn Middleware>> for Pipe {
    fn from(mw: Arc<dyn Middleware>) -> Self {
        Pipe::Instance(mw)
    }
}

/// Collaborators every pipeline needs.
#[derive(Clone)]
pub struct PipelineServices {
    pub factory: Arc<dyn MiddlewareFactory>,
    pub translator: Arc<dyn ErrorTranslator>,
}

impl PipelineServices {
    pub fn new(factory: Arc<dyn MiddlewareFactory>, translator: Arc<dyn ErrorTranslator>) -> Self {
        Self { factory, translator }
    }
}

/// Delegate to the remainder of the chain.
pub struct Next<'a> {
    pipes: &'a [Pipe],
    terminal: Terminal<'a>,
    services: &'a PipelineServices,
}

impl<'a> Next<'a> {
    pub(crate) fn new(pipes: &'a [Pipe], terminal: Terminal<'a>, services: &'a PipelineServices) -> Self {
        Self {
            pipes,
            terminal,
            services,
        }
    }

    /// Run the rest of the chain. Failures are translated here.
    pub fn run(self, request: Request<Body>) -> Response {
        let head = RequestHead::from(&request);

        let Some((pipe, rest)) = self.pipes.split_first() else {
            return match (self.terminal)(request) {
                Ok(response) => response,
                Err(error) => self.translate(error, &head, "terminal"),
            };
        };

        let next = Next::new(rest, self.terminal, self.services);
        let result = match pipe {
            Pipe::Instance(middleware) => middleware.process(request, next),
            Pipe::Blueprint(bp) => self
                .services
                .factory
                .create(&bp.id, &bp.coerced_args())
                .and_then(|middleware| middleware.process(request, next)),
        };

        match result {
            Ok(response) => response,
            Err(error) => self.translate(error, &head, &pipe.label()),
        }
    }

    fn translate(&self, error: BoxError, head: &RequestHead, link: &str) -> Response {
        tracing::debug!(
            link = %link,
            method = %head.method,
            path = %head.uri.path(),
            error = %error,
            "Pipeline link failed"
        );
        metrics::record_pipeline_error(link);
        self.services.translator.handle(error, head)
    }
}
