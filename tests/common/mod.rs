//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use cms_router::config::schema::RouterConfig;
use cms_router::http::response::ControllerOutput;
use cms_router::lifecycle::{Application, Collaborators};
use cms_router::pipeline::middleware::{from_fn, BoxError, Middleware, MiddlewareRegistry};
use cms_router::pipeline::runner::ControllerRegistry;
use cms_router::routing::collection::RouteCollection;

pub const SECRET: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

/// Execution log shared by recording middleware and controllers.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn config() -> RouterConfig {
    let mut config = RouterConfig::default();
    config.signing.secret = SECRET.to_string();
    config.url.host = "example.com".to_string();
    config
}

pub fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Register middleware that logs its id (and arguments) then continues.
pub fn registry(log: &Log, ids: &[&'static str]) -> MiddlewareRegistry {
    let mut registry = MiddlewareRegistry::new();
    for &id in ids {
        let log = log.clone();
        registry.register(id, move |args| {
            let label = if args.is_empty() {
                id.to_string()
            } else {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                format!("{}:{}", id, args.join(","))
            };
            let log = log.clone();
            Ok(Box::new(from_fn(move |req, next| {
                log.lock().unwrap().push(label.clone());
                Ok(next.run(req))
            })) as Box<dyn Middleware>)
        });
    }
    registry
}

/// `Posts` echoes the action and parameters; `Boom` always fails.
pub fn controllers(log: &Log) -> ControllerRegistry {
    let mut controllers = ControllerRegistry::new();
    let posts_log = log.clone();
    controllers.register_fn(
        "Posts",
        move |action: &str, _req: Request<Body>, params: &BTreeMap<String, String>| {
            posts_log.lock().unwrap().push(format!("Posts@{}", action));
            let params: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            Ok(ControllerOutput::Text(format!("{} {}", action, params.join("&"))))
        },
    );
    controllers.register_fn("Boom", |_: &str, _: Request<Body>, _: &BTreeMap<String, String>| {
        Err::<ControllerOutput, BoxError>("controller exploded".into())
    });
    controllers
}

pub fn boot(config: &RouterConfig, routes: RouteCollection, collaborators: Collaborators) -> Application {
    let source = cms_router::lifecycle::route_source(config, routes).unwrap();
    Application::boot(config, source, collaborators).unwrap()
}

pub fn temp_path(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}.json", prefix, uuid::Uuid::new_v4()))
}
