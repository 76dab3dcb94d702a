//! Typed errors and HTTP mapping.

use crate::render::RenderError;
use crate::schema::ValidationErrors;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("reserved field name '{field}' on resource '{resource}'")]
    ReservedField { resource: String, field: String },
    #[error("invalid route {method} {path}: {reason}")]
    InvalidRoute { method: String, path: String, reason: String },
    #[error("environment variable {name}: {reason}")]
    Env { name: &'static str, reason: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed")]
    Validation(ValidationErrors),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("method not allowed")]
    MethodNotAllowed { allow: Vec<String> },
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("request timed out")]
    Timeout,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

/// Shared client-facing error shape: `{ error, code?, details? }`.
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(code: &str, error: impl Into<String>) -> Self {
        ErrorBody {
            error: error.into(),
            code: Some(code.to_string()),
            details: None,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            AppError::Store(StoreError::Other(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Render(RenderError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Render(RenderError::Failed { .. }) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Client-facing body. Internal detail never leaves the process; it is logged instead.
    pub fn body(&self) -> ErrorBody {
        match self {
            AppError::NotFound(what) => ErrorBody::new("not_found", format!("{} not found", what)),
            AppError::Validation(errors) => ErrorBody {
                error: format!("request failed validation ({} field errors)", errors.len()),
                code: Some("validation_error".into()),
                details: serde_json::to_value(errors.as_slice()).ok(),
            },
            AppError::BadRequest(msg) => ErrorBody::new("bad_request", msg.clone()),
            AppError::MethodNotAllowed { .. } => ErrorBody::new("method_not_allowed", "method not allowed"),
            AppError::Unauthorized => ErrorBody::new("unauthorized", "missing or invalid bearer token"),
            AppError::PayloadTooLarge => ErrorBody::new("payload_too_large", "request body exceeds the size limit"),
            AppError::Timeout => ErrorBody::new("timeout", "request timed out"),
            AppError::Store(StoreError::Unavailable(_)) => {
                ErrorBody::new("persistence_unavailable", "storage is temporarily unavailable")
            }
            AppError::Store(StoreError::Conflict(msg)) => ErrorBody::new("conflict", msg.clone()),
            AppError::Render(RenderError::Unavailable(_)) => {
                ErrorBody::new("renderer_unavailable", "document renderer is unavailable")
            }
            AppError::Render(RenderError::Failed { .. }) => {
                ErrorBody::new("renderer_failed", "document renderer failed to produce the artifact")
            }
            AppError::Config(_) | AppError::Internal(_) | AppError::Store(StoreError::Other(_)) => {
                ErrorBody::new("internal_error", "internal server error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        let body = self.body();
        match self {
            AppError::MethodNotAllowed { allow } => (
                status,
                [(axum::http::header::ALLOW, allow.join(", "))],
                Json(body),
            )
                .into_response(),
            AppError::Unauthorized => (
                status,
                [(axum::http::header::WWW_AUTHENTICATE, "Bearer".to_string())],
                Json(body),
            )
                .into_response(),
            _ => (status, Json(body)).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldError, Reason};

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = AppError::Store(StoreError::Other("relation \"secret_table\" does not exist".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.body();
        assert_eq!(body.error, "internal server error");
        assert!(body.details.is_none());
    }

    #[test]
    fn renderer_failures_map_to_distinct_statuses() {
        let down = AppError::Render(RenderError::Unavailable("connection refused".into()));
        let failed = AppError::Render(RenderError::Failed { status: 500, message: "boom".into() });
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn validation_body_lists_details() {
        let errors = ValidationErrors::from(vec![
            FieldError::new("name", Reason::Empty, "name must not be empty"),
            FieldError::new("price", Reason::NotPositive, "price must be greater than 0"),
        ]);
        let body = AppError::Validation(errors).body();
        assert_eq!(body.code.as_deref(), Some("validation_error"));
        let details = body.details.expect("details");
        assert_eq!(details.as_array().map(Vec::len), Some(2));
        assert_eq!(details[1]["field"], "price");
        assert_eq!(details[1]["reason"], "not_positive");
    }
}
