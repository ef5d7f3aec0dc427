//! Pipeline errors and their translation into responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::request::RequestHead;
use crate::http::response::HttpError;
use crate::pipeline::middleware::BoxError;
use crate::routing::error::RoutingError;
use crate::signing::error::SignedUrlError;

/// Misuse of a `Pipeline`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Pipeline already ran; pipelines are single-use")]
    Exhausted,

    #[error("Pipeline has no request; call send() first")]
    MissingRequest,
}

/// Turns a failure raised inside the pipeline into a response.
pub trait ErrorTranslator: Send + Sync {
    fn handle(&self, error: BoxError, request: &RequestHead) -> Response;
}

/// Maps known error types to status codes; everything else is a 500.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorTranslator {
    expose_details: bool,
}

impl DefaultErrorTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include the error message in 500 bodies. Development only.
    pub fn with_details(mut self, expose: bool) -> Self {
        self.expose_details = expose;
        self
    }

    fn classify(&self, error: &BoxError) -> (StatusCode, String) {
        if let Some(e) = error.downcast_ref::<HttpError>() {
            return (e.status, e.message.clone());
        }
        if let Some(e) = error.downcast_ref::<SignedUrlError>() {
            return (StatusCode::FORBIDDEN, e.to_string());
        }
        if let Some(RoutingError::RouteNotFound(_)) = error.downcast_ref::<RoutingError>() {
            return (StatusCode::NOT_FOUND, "Not Found".to_string());
        }

        let message = if self.expose_details {
            error.to_string()
        } else {
            "Internal Server Error".to_string()
        };
        (StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl ErrorTranslator for DefaultErrorTranslator {
    fn handle(&self, error: BoxError, request: &RequestHead) -> Response {
        let (status, message) = self.classify(&error);

        if status.is_server_error() {
            tracing::error!(
                method = %request.method,
                path = %request.uri.path(),
                error = %error,
                "Request failed"
            );
        } else {
            tracing::warn!(
                method = %request.method,
                path = %request.uri.path(),
                status = status.as_u16(),
                error = %error,
                "Request rejected"
            );
        }

        (status, message).into_response()
    }
}
