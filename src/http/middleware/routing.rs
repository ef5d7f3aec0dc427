//! Routing stage: dispatch the request and attach the outcome.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::pipeline::middleware::{BoxError, Middleware, Next};
use crate::routing::area::AdminArea;
use crate::routing::matcher::UrlMatcher;

pub struct RoutingMiddleware {
    matcher: Arc<UrlMatcher>,
    admin_area: Option<Arc<dyn AdminArea>>,
}

impl RoutingMiddleware {
    pub fn new(matcher: Arc<UrlMatcher>) -> Self {
        Self {
            matcher,
            admin_area: None,
        }
    }

    pub fn with_admin_area(mut self, area: Arc<dyn AdminArea>) -> Self {
        self.admin_area = Some(area);
        self
    }

    /// Path the matcher should see for this request.
    fn routing_path(&self, request: &Request<Body>) -> String {
        let path = request.uri().path();
        match &self.admin_area {
            Some(area) if area.contains(path) => area.rewrite_for_routing(request),
            _ => path.to_string(),
        }
    }
}

impl Middleware for RoutingMiddleware {
    fn process(&self, mut request: Request<Body>, next: Next<'_>) -> Result<Response, BoxError> {
        let path = self.routing_path(&request);
        let outcome = self.matcher.dispatch(request.method().as_str(), &path);

        tracing::trace!(
            method = %request.method(),
            path = %path,
            matched = outcome.is_match(),
            "Request dispatched"
        );

        request.extensions_mut().insert(outcome);
        Ok(next.run(request))
    }
}
