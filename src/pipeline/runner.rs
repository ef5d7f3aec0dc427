//! Route runner: the stage after routing.
//!
//! # Responsibilities
//! - Read the dispatch result attached by the routing stage
//! - Run route, global and controller middleware, then the controller
//! - Run routeless middleware for requests that matched nothing
//!
//! # Design Decisions
//! - A 404 is delegated to the host through `next`, not answered here
//! - A 405 is answered here with an `Allow` header
//! - Route-level middleware is declared before controller-level middleware;
//!   the priority list decides the final order

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::request::{RequestExt, RequestHead};
use crate::http::response::{ControllerOutput, ResponseNormalizer};
use crate::pipeline::blueprint::MiddlewareBlueprint;
use crate::pipeline::chain::Pipeline;
use crate::pipeline::middleware::{BoxError, Middleware, Next, PipelineServices};
use crate::pipeline::priority::MiddlewareResolver;
use crate::routing::matcher::{MatchResult, RouteMatch};
use crate::routing::route::ControllerRef;

/// Application code behind a route.
pub trait Controller: Send + Sync {
    /// Middleware this controller declares for one action.
    fn middleware(&self, _action: &str) -> Vec<MiddlewareBlueprint> {
        Vec::new()
    }

    fn call(
        &self,
        action: &str,
        request: Request<Body>,
        params: &BTreeMap<String, String>,
    ) -> Result<ControllerOutput, BoxError>;
}

/// Looks up controllers by the opaque reference stored on a route.
pub trait ControllerResolver: Send + Sync {
    fn resolve(&self, target: &ControllerRef) -> Result<Arc<dyn Controller>, BoxError>;
}

#[derive(Debug, Error)]
#[error("No controller registered as `{0}`")]
pub struct UnknownController(pub String);

type HandlerFn =
    dyn Fn(&str, Request<Body>, &BTreeMap<String, String>) -> Result<ControllerOutput, BoxError> + Send + Sync;

struct FnController(Box<HandlerFn>);

impl Controller for FnController {
    fn call(
        &self,
        action: &str,
        request: Request<Body>,
        params: &BTreeMap<String, String>,
    ) -> Result<ControllerOutput, BoxError> {
        (self.0)(action, request, params)
    }
}

/// Controllers keyed by name.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<dyn Controller>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, controller: Arc<dyn Controller>) -> &mut Self {
        self.controllers.insert(name.into(), controller);
        self
    }

    /// Register a closure as a controller with no declared middleware.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&str, Request<Body>, &BTreeMap<String, String>) -> Result<ControllerOutput, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, Arc::new(FnController(Box::new(handler))))
    }
}

impl ControllerResolver for ControllerRegistry {
    fn resolve(&self, target: &ControllerRef) -> Result<Arc<dyn Controller>, BoxError> {
        self.controllers
            .get(&target.controller)
            .cloned()
            .ok_or_else(|| UnknownController(target.controller.clone()).into())
    }
}

pub struct RouteRunner {
    services: PipelineServices,
    resolver: MiddlewareResolver,
    global: Vec<MiddlewareBlueprint>,
    routeless: Vec<MiddlewareBlueprint>,
    controllers: Arc<dyn ControllerResolver>,
    normalizer: Arc<dyn ResponseNormalizer>,
}

impl RouteRunner {
    pub fn new(
        services: PipelineServices,
        resolver: MiddlewareResolver,
        controllers: Arc<dyn ControllerResolver>,
        normalizer: Arc<dyn ResponseNormalizer>,
    ) -> Self {
        Self {
            services,
            resolver,
            global: Vec::new(),
            routeless: Vec::new(),
            controllers,
            normalizer,
        }
    }

    /// Middleware run for every matched route, ahead of the route's own.
    pub fn with_global(mut self, global: Vec<MiddlewareBlueprint>) -> Self {
        self.global = global;
        self
    }

    /// Middleware run for requests no route matched.
    pub fn with_routeless(mut self, routeless: Vec<MiddlewareBlueprint>) -> Self {
        self.routeless = routeless;
        self
    }

    fn run_route(&self, request: Request<Body>, matched: RouteMatch) -> Result<Response, BoxError> {
        let target = matched.route.controller().clone();
        let controller = self.controllers.resolve(&target)?;

        let from_controller = controller.middleware(&target.action);
        let declared = self
            .global
            .iter()
            .chain(matched.route.middleware_list())
            .chain(from_controller.iter());
        let pipes = self.resolver.resolve(declared);

        tracing::debug!(
            route = matched.route.name().unwrap_or_default(),
            controller = %target,
            middleware = pipes.len(),
            "Running route"
        );

        let params = matched.params;
        let normalizer = &self.normalizer;
        self.run_pipeline(request, pipes, move |req: Request<Body>| {
            let head = RequestHead::from(&req);
            let output = controller.call(&target.action, req, &params)?;
            Ok(normalizer.normalize(output, &head))
        })
    }

    fn run_routeless(&self, request: Request<Body>, next: Next<'_>) -> Result<Response, BoxError> {
        let next = Cell::new(Some(next));
        self.run_pipeline(request, self.resolver.resolve(&self.routeless), move |req| {
            match next.take() {
                Some(next) => Ok(next.run(req)),
                None => Err("host delegate invoked twice".into()),
            }
        })
    }

    fn run_method_not_allowed(&self, request: Request<Body>, allow: String) -> Result<Response, BoxError> {
        self.run_pipeline(request, self.resolver.resolve(&self.routeless), move |_req| {
            let mut response = (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response();
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_str(&allow)?);
            Ok(response)
        })
    }

    fn run_pipeline<F>(
        &self,
        request: Request<Body>,
        pipes: Vec<MiddlewareBlueprint>,
        terminal: F,
    ) -> Result<Response, BoxError>
    where
        F: Fn(Request<Body>) -> Result<Response, BoxError>,
    {
        let mut pipeline = Pipeline::new(self.services.clone());
        let response = pipeline.send(request)?.through(pipes)?.then(terminal)?;
        Ok(response)
    }
}

impl Middleware for RouteRunner {
    fn process(&self, request: Request<Body>, next: Next<'_>) -> Result<Response, BoxError> {
        let outcome = request.match_result().cloned().unwrap_or(MatchResult::NotFound);

        if let Some(allow) = outcome.allow_header() {
            return self.run_method_not_allowed(request, allow);
        }

        match outcome {
            MatchResult::Matched(matched) => self.run_route(request, matched),
            _ => self.run_routeless(request, next),
        }
    }
}
