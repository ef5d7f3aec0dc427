//! Request-side helpers.
//!
//! # Responsibilities
//! - Snapshot the request head for error translation
//! - Read routing results that earlier stages attached to the request
//!
//! # Design Decisions
//! - The dispatch result travels in request extensions, not in globals
//! - The head snapshot is taken before a link consumes the request

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Uri};

use crate::routing::matcher::{MatchResult, RouteMatch};
use crate::signing::signer::VerifiedUrl;

/// Method, URI and headers of a request, without its body.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl From<&Request<Body>> for RequestHead {
    fn from(request: &Request<Body>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        }
    }
}

/// Accessors for values the router attaches to a request.
pub trait RequestExt {
    /// The dispatch result, once routing has run.
    fn match_result(&self) -> Option<&MatchResult>;

    /// The matched route and its parameters.
    fn route_match(&self) -> Option<&RouteMatch> {
        match self.match_result()? {
            MatchResult::Matched(m) => Some(m),
            _ => None,
        }
    }

    /// One captured (or defaulted) route parameter.
    fn route_param(&self, name: &str) -> Option<&str> {
        self.route_match()?.params.get(name).map(String::as_str)
    }

    /// Set by the signed URL middleware after a successful check.
    fn verified_url(&self) -> Option<&VerifiedUrl>;
}

impl RequestExt for Request<Body> {
    fn match_result(&self) -> Option<&MatchResult> {
        self.extensions().get::<MatchResult>()
    }

    fn verified_url(&self) -> Option<&VerifiedUrl> {
        self.extensions().get::<VerifiedUrl>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use crate::routing::route::Route;

    #[test]
    fn test_route_param_reads_extension() {
        let route = Route::get("/users/{id}", "Users@show".parse().unwrap()).unwrap();
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), "7".to_string());

        let mut request = Request::builder().uri("/users/7").body(Body::empty()).unwrap();
        assert!(request.route_param("id").is_none());

        request.extensions_mut().insert(MatchResult::Matched(RouteMatch {
            route: Arc::new(route),
            params,
        }));
        assert_eq!(request.route_param("id"), Some("7"));
        assert!(request.route_param("missing").is_none());
    }

    #[test]
    fn test_head_snapshot() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/a?b=c")
            .header("x-test", "1")
            .body(Body::empty())
            .unwrap();
        let head = RequestHead::from(&request);
        assert_eq!(head.method, Method::POST);
        assert_eq!(head.uri.query(), Some("b=c"));
        assert_eq!(head.headers["x-test"], "1");
    }
}
