//! HTTP error responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::any::Any;
use tracing::error;

use crate::error::DeployError;

/// Errors a handler can return. The body only ever carries a fixed message.
#[derive(Debug)]
pub enum ApiError {
    InvalidSignature,
    MalformedPayload(serde_json::Error),
    NotFound,
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidSignature => StatusCode::FORBIDDEN,
            ApiError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ApiError::InvalidSignature => "invalid signature",
            ApiError::MalformedPayload(_) => "invalid JSON payload",
            ApiError::NotFound => "not found",
            ApiError::Internal(_) => "internal server error",
        }
    }
}

impl From<DeployError> for ApiError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::MalformedPayload(e) => ApiError::MalformedPayload(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!("Internal error while handling request: {}", detail);
        }
        (
            self.status(),
            Json(json!({ "error": self.public_message() })),
        )
            .into_response()
    }
}

/// Turns a handler panic into a generic 500.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::Internal(format!("handler panicked: {}", detail)).into_response()
}
