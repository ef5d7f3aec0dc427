//! Middleware ordering and fault isolation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};

use cms_router::http::request::RequestHead;
use cms_router::http::response::{ControllerOutput, HttpError};
use cms_router::lifecycle::Collaborators;
use cms_router::pipeline::blueprint::MiddlewareBlueprint;
use cms_router::pipeline::errors::ErrorTranslator;
use cms_router::pipeline::middleware::{from_fn, BoxError, Middleware};
use cms_router::pipeline::runner::{Controller, ControllerRegistry};
use cms_router::routing::collection::RouteCollection;
use cms_router::routing::route::{ControllerRef, Route};

mod common;
use common::*;

fn single_route(route: Route) -> RouteCollection {
    let mut routes = RouteCollection::new();
    routes.add(route).unwrap();
    routes
}

#[tokio::test]
async fn test_priority_orders_route_middleware() {
    let log = new_log();
    let mut config = config();
    config.middleware.priority = vec!["a".into(), "b".into(), "c".into()];

    let route = Route::get("/p", ControllerRef::new("Posts", "index"))
        .unwrap()
        .middleware("c")
        .unwrap()
        .middleware("a")
        .unwrap();
    let app = boot(
        &config,
        single_route(route),
        Collaborators::new(registry(&log, &["a", "b", "c"]), Arc::new(controllers(&log))),
    );

    let res = app.kernel().handle_or_not_found(request("GET", "/p"));
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(entries(&log), ["a", "c", "Posts@index"]);
}

#[tokio::test]
async fn test_global_groups_and_arguments() {
    let log = new_log();
    let mut config = config();
    config.middleware.priority = vec!["session".into(), "auth".into()];
    config.middleware.global = vec!["web".into()];
    config
        .middleware
        .groups
        .insert("web".into(), vec!["session".into(), "csrf".into()]);

    let route = Route::get("/p", ControllerRef::new("Posts", "index"))
        .unwrap()
        .middleware("can:edit,3")
        .unwrap()
        .middleware("auth")
        .unwrap()
        .middleware("csrf")
        .unwrap();
    let app = boot(
        &config,
        single_route(route),
        Collaborators::new(
            registry(&log, &["session", "auth", "csrf", "can"]),
            Arc::new(controllers(&log)),
        ),
    );

    app.kernel().handle_or_not_found(request("GET", "/p"));
    assert_eq!(entries(&log), ["session", "auth", "csrf", "can:edit,3", "Posts@index"]);
}

struct Guarded;

impl Controller for Guarded {
    fn middleware(&self, action: &str) -> Vec<MiddlewareBlueprint> {
        if action == "edit" {
            vec![MiddlewareBlueprint::new("b")]
        } else {
            Vec::new()
        }
    }

    fn call(
        &self,
        action: &str,
        _request: Request<Body>,
        _params: &BTreeMap<String, String>,
    ) -> Result<ControllerOutput, BoxError> {
        Ok(ControllerOutput::Text(action.to_string()))
    }
}

#[tokio::test]
async fn test_controller_middleware_merged_after_route_middleware() {
    let log = new_log();
    let mut config = config();
    config.middleware.priority = vec!["a".into(), "b".into()];

    let mut controllers = ControllerRegistry::new();
    controllers.register("Guarded", Arc::new(Guarded));

    let mut routes = RouteCollection::new();
    routes
        .add(Route::get("/edit", ControllerRef::new("Guarded", "edit")).unwrap().middleware("c").unwrap())
        .unwrap();
    routes
        .add(Route::get("/view", ControllerRef::new("Guarded", "view")).unwrap().middleware("c").unwrap())
        .unwrap();
    let app = boot(
        &config,
        routes,
        Collaborators::new(registry(&log, &["a", "b", "c"]), Arc::new(controllers)),
    );

    let res = app.kernel().handle_or_not_found(request("GET", "/edit"));
    assert_eq!(body_string(res).await, "edit");
    assert_eq!(entries(&log), ["b", "c"]);

    log.lock().unwrap().clear();
    app.kernel().handle_or_not_found(request("GET", "/view"));
    assert_eq!(entries(&log), ["c"]);
}

struct CountingTranslator(Arc<AtomicUsize>);

impl ErrorTranslator for CountingTranslator {
    fn handle(&self, error: BoxError, _request: &RequestHead) -> Response {
        self.0.fetch_add(1, Ordering::SeqCst);
        match error.downcast_ref::<HttpError>() {
            Some(e) => (e.status, e.message.clone()).into_response(),
            None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

#[tokio::test]
async fn test_failure_translated_once_and_later_links_skipped() {
    let log = new_log();
    let translated = Arc::new(AtomicUsize::new(0));
    let mut config = config();
    config.middleware.priority = vec!["first".into(), "deny".into(), "last".into()];

    let mut middleware = registry(&log, &["first", "last"]);
    let deny_log = log.clone();
    middleware.register("deny", move |_args| {
        let log = deny_log.clone();
        Ok(Box::new(from_fn(move |_req, _next| {
            log.lock().unwrap().push("deny".to_string());
            Err(HttpError::forbidden("denied").into())
        })) as Box<dyn Middleware>)
    });

    let route = Route::get("/p", ControllerRef::new("Posts", "index"))
        .unwrap()
        .middleware("last")
        .unwrap()
        .middleware("deny")
        .unwrap()
        .middleware("first")
        .unwrap();
    let collaborators = Collaborators::new(middleware, Arc::new(controllers(&log)))
        .with_translator(Arc::new(CountingTranslator(translated.clone())));
    let app = boot(&config, single_route(route), collaborators);

    let res = app.kernel().handle_or_not_found(request("GET", "/p"));
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(res).await, "denied");
    assert_eq!(translated.load(Ordering::SeqCst), 1);
    assert_eq!(entries(&log), ["first", "deny"]);
}

#[tokio::test]
async fn test_unknown_middleware_fails_request_not_boot() {
    let log = new_log();
    let route = Route::get("/p", ControllerRef::new("Posts", "index"))
        .unwrap()
        .middleware("missing")
        .unwrap();
    let app = boot(
        &config(),
        single_route(route),
        Collaborators::new(registry(&log, &[]), Arc::new(controllers(&log))),
    );

    let res = app.kernel().handle_or_not_found(request("GET", "/p"));
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(entries(&log).is_empty());
}
