//! Response-side helpers.
//!
//! # Responsibilities
//! - Carry an HTTP status through the error channel (`HttpError`)
//! - Turn whatever a controller returned into a `Response`
//!
//! # Design Decisions
//! - Controllers return `ControllerOutput`; only the normalizer builds responses
//! - `HEAD` responses keep their headers and drop the body

use axum::body::Body;
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use thiserror::Error;

use crate::http::request::RequestHead;

/// An error that already knows its status code.
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found")
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// What a controller action may return.
#[derive(Debug)]
pub enum ControllerOutput {
    /// Passed through untouched.
    Response(Response),
    Html(String),
    Text(String),
    Json(serde_json::Value),
    Redirect(String),
    Empty,
}

impl From<Response> for ControllerOutput {
    fn from(response: Response) -> Self {
        ControllerOutput::Response(response)
    }
}

impl From<String> for ControllerOutput {
    fn from(text: String) -> Self {
        ControllerOutput::Text(text)
    }
}

impl From<&str> for ControllerOutput {
    fn from(text: &str) -> Self {
        ControllerOutput::Text(text.to_string())
    }
}

impl From<serde_json::Value> for ControllerOutput {
    fn from(value: serde_json::Value) -> Self {
        ControllerOutput::Json(value)
    }
}

/// Converts controller output into a response.
pub trait ResponseNormalizer: Send + Sync {
    fn normalize(&self, output: ControllerOutput, request: &RequestHead) -> Response;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResponseNormalizer;

impl ResponseNormalizer for DefaultResponseNormalizer {
    fn normalize(&self, output: ControllerOutput, request: &RequestHead) -> Response {
        let response = match output {
            ControllerOutput::Response(response) => return response,
            ControllerOutput::Html(html) => Html(html).into_response(),
            ControllerOutput::Text(text) => text.into_response(),
            ControllerOutput::Json(value) => Json(value).into_response(),
            ControllerOutput::Redirect(location) => Redirect::to(&location).into_response(),
            ControllerOutput::Empty => StatusCode::NO_CONTENT.into_response(),
        };

        if request.method == Method::HEAD {
            let (parts, _) = response.into_parts();
            return Response::from_parts(parts, Body::empty());
        }
        response
    }
}
