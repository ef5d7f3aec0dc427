//! Request dispatch against a frozen route collection.
//!
//! # Responsibilities
//! - Match method + path to a route and decode its segments
//! - Report method-not-allowed with the union of accepted methods
//! - Report no-match explicitly
//!
//! # Design Decisions
//! - Outcomes are plain values, not errors: every request may produce them
//! - Path matching is case-sensitive; methods are case-insensitive
//! - First registered route wins when two routes accept the same method
//!   and path (logged at startup)
//! - Immutable after construction (thread-safe without locks)

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::observability::metrics;
use crate::routing::collection::RouteSource;
use crate::routing::error::RoutingResult;
use crate::routing::pattern::path_segments;
use crate::routing::route::Route;

/// A successful dispatch.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    /// Decoded segment values merged over the route defaults.
    pub params: BTreeMap<String, String>,
}

/// Outcome of `UrlMatcher::dispatch`.
#[derive(Debug, Clone)]
pub enum MatchResult {
    NotFound,
    MethodNotAllowed { allowed: BTreeSet<String> },
    Matched(RouteMatch),
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched(_))
    }

    pub fn route(&self) -> Option<&Arc<Route>> {
        match self {
            MatchResult::Matched(m) => Some(&m.route),
            _ => None,
        }
    }

    /// Value for an `Allow` header, when the method was rejected.
    pub fn allow_header(&self) -> Option<String> {
        match self {
            MatchResult::MethodNotAllowed { allowed } => {
                Some(allowed.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
            }
            _ => None,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            MatchResult::NotFound => "not_found",
            MatchResult::MethodNotAllowed { .. } => "method_not_allowed",
            MatchResult::Matched(_) => "matched",
        }
    }
}

/// Compiled matcher over a snapshot of the collection.
#[derive(Debug)]
pub struct UrlMatcher {
    routes: Vec<Arc<Route>>,
}

impl UrlMatcher {
    /// Build the matcher. Fails if any cached entry is corrupted.
    pub fn new(source: &dyn RouteSource) -> RoutingResult<Self> {
        let routes = source.all()?;
        warn_on_ambiguity(&routes);
        tracing::info!(routes = routes.len(), "URL matcher compiled");
        Ok(Self { routes })
    }

    /// Dispatch a request method and path (a query string, if present, is ignored).
    pub fn dispatch(&self, method: &str, path: &str) -> MatchResult {
        let path = path.split('?').next().unwrap_or_default();
        let segments = path_segments(path);
        let method = method.to_ascii_uppercase();

        let mut allowed = BTreeSet::new();
        let mut result = MatchResult::NotFound;

        for route in &self.routes {
            let Some(params) = route.match_segments(&segments) else {
                continue;
            };
            if route.allows_method(&method) {
                result = MatchResult::Matched(RouteMatch {
                    route: route.clone(),
                    params,
                });
                break;
            }
            allowed.extend(route.methods().iter().cloned());
        }

        if !result.is_match() && !allowed.is_empty() {
            result = MatchResult::MethodNotAllowed { allowed };
        }

        tracing::debug!(
            method = %method,
            path = %path,
            outcome = result.outcome(),
            route = ?result.route().and_then(|r| r.name()),
            "Dispatched request"
        );
        metrics::record_dispatch(result.outcome());
        result
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }
}

fn warn_on_ambiguity(routes: &[Arc<Route>]) {
    for (i, first) in routes.iter().enumerate() {
        for later in &routes[i + 1..] {
            if first.pattern().tokens() == later.pattern().tokens()
                && first.methods().intersection(later.methods()).next().is_some()
            {
                tracing::warn!(
                    winner = ?first.name(),
                    shadowed = ?later.name(),
                    pattern = %first.pattern().as_str(),
                    "Ambiguous routes: first registered wins"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::collection::RouteCollection;
    use crate::routing::route::{ControllerRef, Requirement};

    fn ctrl(action: &str) -> ControllerRef {
        ControllerRef::new("C", action)
    }

    fn matcher(routes: Vec<Route>) -> UrlMatcher {
        let mut collection = RouteCollection::new();
        for r in routes {
            collection.add(r).unwrap();
        }
        collection.freeze();
        UrlMatcher::new(&collection).unwrap()
    }

    #[test]
    fn test_match_decodes_segments() {
        let m = matcher(vec![Route::get("/users/{id}", ctrl("show")).unwrap().named("users.show").unwrap()]);

        match m.dispatch("GET", "/users/42") {
            MatchResult::Matched(found) => {
                assert_eq!(found.route.name(), Some("users.show"));
                assert_eq!(found.params.get("id").map(String::as_str), Some("42"));
            }
            other => panic!("expected match, got {:?}", other),
        }

        match m.dispatch("get", "/users/john%20doe/?tab=1") {
            MatchResult::Matched(found) => assert_eq!(found.params["id"], "john doe"),
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn test_method_not_allowed_lists_union() {
        let m = matcher(vec![
            Route::get("/foo", ctrl("a")).unwrap(),
            Route::post("/foo", ctrl("b")).unwrap(),
        ]);

        let result = m.dispatch("DELETE", "/foo");
        match &result {
            MatchResult::MethodNotAllowed { allowed } => {
                let allowed: Vec<&str> = allowed.iter().map(String::as_str).collect();
                assert_eq!(allowed, vec!["GET", "HEAD", "POST"]);
            }
            other => panic!("expected 405, got {:?}", other),
        }
        assert_eq!(result.allow_header().as_deref(), Some("GET, HEAD, POST"));
    }

    #[test]
    fn test_not_found() {
        let m = matcher(vec![Route::get("/foo", ctrl("a")).unwrap()]);
        assert!(matches!(m.dispatch("GET", "/bar"), MatchResult::NotFound));
    }

    #[test]
    fn test_first_registered_wins() {
        let m = matcher(vec![
            Route::get("/dup/{id}", ctrl("first")).unwrap().named("first").unwrap(),
            Route::get("/dup/{slug}", ctrl("second")).unwrap().named("second").unwrap(),
        ]);
        let result = m.dispatch("GET", "/dup/1");
        assert_eq!(result.route().and_then(|r| r.name()), Some("first"));
    }

    #[test]
    fn test_requirement_falls_through_to_next_route() {
        let m = matcher(vec![
            Route::get("/posts/{id}", ctrl("by_id"))
                .unwrap()
                .require("id", Requirement::Numeric)
                .unwrap()
                .named("posts.id")
                .unwrap(),
            Route::get("/posts/{slug}", ctrl("by_slug")).unwrap().named("posts.slug").unwrap(),
        ]);
        assert_eq!(m.dispatch("GET", "/posts/12").route().and_then(|r| r.name()), Some("posts.id"));
        assert_eq!(
            m.dispatch("GET", "/posts/hello").route().and_then(|r| r.name()),
            Some("posts.slug")
        );
    }

    #[test]
    fn test_head_served_by_get_routes() {
        let m = matcher(vec![Route::get("/foo", ctrl("a")).unwrap()]);
        assert!(m.dispatch("HEAD", "/foo").is_match());
    }

    #[test]
    fn test_optional_segment_dispatch() {
        let m = matcher(vec![Route::get("/teams/{team}/{id?}", ctrl("a"))
            .unwrap()
            .with_default("id", "0")
            .unwrap()]);
        match m.dispatch("GET", "/teams/red") {
            MatchResult::Matched(found) => assert_eq!(found.params["id"], "0"),
            other => panic!("expected match, got {:?}", other),
        }
    }
}
