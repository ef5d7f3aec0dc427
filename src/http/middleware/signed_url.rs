//! Signed URL middleware.
//! Rejects requests whose link signature, expiry or usage budget fails.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::pipeline::blueprint::MiddlewareArg;
use crate::pipeline::middleware::{BoxError, Middleware, MiddlewareRegistry, Next};
use crate::signing::error::SignedUrlError;
use crate::signing::signer::UrlSigner;

/// Identifier the middleware is registered under.
pub const SIGNED_MIDDLEWARE: &str = "signed";

pub struct SignedUrlMiddleware {
    signer: Arc<UrlSigner>,
}

impl SignedUrlMiddleware {
    pub fn new(signer: Arc<UrlSigner>) -> Self {
        Self { signer }
    }

    /// Register under `signed` so routes can declare it.
    pub fn register(registry: &mut MiddlewareRegistry, signer: Arc<UrlSigner>) {
        registry.register(SIGNED_MIDDLEWARE, move |_args: &[MiddlewareArg]| {
            Ok(Box::new(SignedUrlMiddleware::new(signer.clone())) as Box<dyn Middleware>)
        });
    }
}

fn rejection_message(error: &SignedUrlError) -> &'static str {
    match error {
        SignedUrlError::InvalidSignature => "Invalid signature",
        SignedUrlError::Expired => "Link expired",
        SignedUrlError::BadIdentifier => "Link already used",
        SignedUrlError::Storage(_) => "Link could not be verified",
    }
}

impl Middleware for SignedUrlMiddleware {
    fn process(&self, mut request: Request<Body>, next: Next<'_>) -> Result<Response, BoxError> {
        match self.signer.verify_request(&request) {
            Ok(verified) => {
                request.extensions_mut().insert(verified);
                Ok(next.run(request))
            }
            Err(e) => {
                debug!(path = %request.uri().path(), reason = e.kind(), "Responding 403 to signed URL");
                Ok((StatusCode::FORBIDDEN, rejection_message(&e)).into_response())
            }
        }
    }
}
