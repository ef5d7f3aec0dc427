//! HTTP kernel: routing stage followed by the route runner.
//!
//! # Responsibilities
//! - Run every request through `RoutingMiddleware` then `RouteRunner`
//! - Fall through to the host when no route matched
//!
//! # Design Decisions
//! - One fresh `Pipeline` per request; the kernel itself is immutable
//! - The host delegate runs after routeless middleware, never on a match

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::middleware::RoutingMiddleware;
use crate::pipeline::chain::Pipeline;
use crate::pipeline::middleware::{Middleware, Pipe, PipelineServices};
use crate::pipeline::runner::RouteRunner;

pub struct HttpKernel {
    services: PipelineServices,
    stages: [Pipe; 2],
}

impl HttpKernel {
    pub fn new(services: PipelineServices, routing: RoutingMiddleware, runner: RouteRunner) -> Self {
        let routing: Arc<dyn Middleware> = Arc::new(routing);
        let runner: Arc<dyn Middleware> = Arc::new(runner);
        Self {
            services,
            stages: [Pipe::Instance(routing), Pipe::Instance(runner)],
        }
    }

    /// Handle one request. `host` answers requests no route matched.
    pub fn handle<H>(&self, request: Request<Body>, host: H) -> Response
    where
        H: Fn(Request<Body>) -> Response,
    {
        let mut pipeline = Pipeline::new(self.services.clone());
        let result = pipeline
            .send(request)
            .and_then(|p| p.through(self.stages.iter().cloned()))
            .and_then(|p| p.then(|req| Ok(host(req))));

        match result {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Kernel pipeline misused");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    /// Handle one request, answering unmatched ones with a plain 404.
    pub fn handle_or_not_found(&self, request: Request<Body>) -> Response {
        self.handle(request, |_| (StatusCode::NOT_FOUND, "Not Found").into_response())
    }
}
