//! Signed URL issue and verification through the kernel.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;

use cms_router::http::middleware::SignedUrlMiddleware;
use cms_router::lifecycle::{Application, Collaborators};
use cms_router::pipeline::chain::Pipeline;
use cms_router::pipeline::errors::DefaultErrorTranslator;
use cms_router::pipeline::middleware::{Middleware, MiddlewareRegistry, PipelineServices};
use cms_router::routing::collection::RouteCollection;
use cms_router::routing::route::{ControllerRef, Route};
use cms_router::signing::signer::{ManualClock, SigningSecret, UrlSigner};
use cms_router::signing::storage::{InMemoryStorage, SignedUrlStorage};

mod common;
use common::*;

fn app(log: &Log, storage: Arc<dyn SignedUrlStorage>) -> Application {
    let mut routes = RouteCollection::new();
    routes
        .add(
            Route::get("/downloads/{file}", ControllerRef::new("Posts", "download"))
                .unwrap()
                .named("download")
                .unwrap()
                .middleware("signed")
                .unwrap(),
        )
        .unwrap();
    let collaborators =
        Collaborators::new(registry(log, &[]), Arc::new(controllers(log))).with_storage(storage);
    boot(&config(), routes, collaborators)
}

#[tokio::test]
async fn test_single_use_link() {
    let log = new_log();
    let app = app(&log, Arc::new(InMemoryStorage::new()));

    let url = app.urls().signed_route("download", [("file", "report.pdf")], false, true).unwrap();
    assert!(url.starts_with("/downloads/report.pdf?expires="));

    let res = app.kernel().handle_or_not_found(request("GET", &url));
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, "download file=report.pdf");

    let res = app.kernel().handle_or_not_found(request("GET", &url));
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(res).await, "Link already used");
}

#[tokio::test]
async fn test_usage_budget() {
    let log = new_log();
    let app = app(&log, Arc::new(InMemoryStorage::new()));

    let url = app
        .urls()
        .signed_route_with("download", [("file", "a")], false, Duration::from_secs(60), 3)
        .unwrap();

    for _ in 0..3 {
        let res = app.kernel().handle_or_not_found(request("GET", &url));
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = app.kernel().handle_or_not_found(request("GET", &url));
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tampered_links_rejected() {
    let log = new_log();
    let storage = Arc::new(InMemoryStorage::new());
    let app = app(&log, storage.clone());

    let url = app.urls().signed_route("download", [("file", "a")], false, true).unwrap();

    let res = app.kernel().handle_or_not_found(request("GET", &url.replace("/a?", "/b?")));
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(res).await, "Invalid signature");

    let res = app.kernel().handle_or_not_found(request("GET", &format!("{}&extra=1", url)));
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.kernel().handle_or_not_found(request("GET", "/downloads/a"));
    assert_eq!(body_string(res).await, "Invalid signature");

    // Rejections do not spend the budget.
    assert_eq!(storage.len(), 1);
    let res = app.kernel().handle_or_not_found(request("GET", &url));
    assert_eq!(res.status(), StatusCode::OK);
    assert!(entries(&log).iter().all(|e| e == "Posts@download"));
}

#[tokio::test]
async fn test_absolute_signed_url() {
    let log = new_log();
    let app = app(&log, Arc::new(InMemoryStorage::new()));

    let url = app.urls().signed_route("download", [("file", "a")], true, true).unwrap();
    assert!(url.starts_with("https://example.com/downloads/a?"));

    let relative = url.trim_start_matches("https://example.com");
    let res = app.kernel().handle_or_not_found(request("GET", relative));
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_link_and_gc() {
    let storage = Arc::new(InMemoryStorage::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let signer = Arc::new(UrlSigner::new(SigningSecret::generate(), storage.clone()).with_clock(clock.clone()));

    let signed = signer.sign("/downloads/a", Duration::from_secs(30), 1).unwrap();
    clock.advance(Duration::from_secs(31));

    let mut registry = MiddlewareRegistry::new();
    SignedUrlMiddleware::register(&mut registry, signer.clone());
    let services = PipelineServices::new(Arc::new(registry), Arc::new(DefaultErrorTranslator::new()));

    let middleware: Arc<dyn Middleware> = Arc::new(SignedUrlMiddleware::new(signer.clone()));
    let mut pipeline = Pipeline::new(services);
    let res = pipeline
        .send(request("GET", &signed.url()))
        .unwrap()
        .through([middleware])
        .unwrap()
        .then(|_| Ok(StatusCode::OK.into_response()))
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(res).await, "Link expired");

    assert_eq!(signer.gc().unwrap(), 1);
    assert!(storage.is_empty());
}
