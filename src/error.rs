//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Model declaration errors. Raised when a schema description is resolved into metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("primary key is not found in model {model}")]
    MissingPrimaryKey { model: String },
    #[error("duplicate primary key for the field: {field} (model {model})")]
    DuplicatePrimaryKey { model: String, field: String },
    #[error("duplicate field {field} in model {model}")]
    DuplicateField { model: String, field: String },
}

/// Route registration errors. Raised once at startup while the route table is built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("handler for {method} {path}: 'request' is reserved and cannot be a keyword parameter")]
    ReservedParameter { method: String, path: String },
    #[error("handler for {method} {path}: parameter '{name}' declared twice")]
    DuplicateParameter { method: String, path: String, name: String },
    #[error("route {method} {path} registered twice")]
    DuplicateRoute { method: String, path: String },
}

/// Error a handler raises to answer the client with a machine-readable code.
/// The dispatcher converts it into a `{ error, data, message }` payload.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{error}: {message}")]
pub struct ApiError {
    pub error: String,
    pub data: String,
    pub message: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, data: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError {
            error: error.into(),
            data: data.into(),
            message: message.into(),
        }
    }

    /// Input value is invalid; `data` names the offending field.
    pub fn value_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new("value:invalid", field, message)
    }

    /// Resource not found; `data` names the resource.
    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new("value:notfound", resource, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new("permission:forbidden", "permission", message)
    }

    pub fn status(&self) -> StatusCode {
        if self.error.starts_with("permission:") {
            StatusCode::FORBIDDEN
        } else if self.error == "value:notfound" {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::BAD_REQUEST
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("template: {0}")]
    Template(#[from] minijinja::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Api(e) => return e.clone().into_response(),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            AppError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Template(_) => (StatusCode::INTERNAL_SERVER_ERROR, "template_error"),
            AppError::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error"),
            AppError::Schema(_) | AppError::Route(_) | AppError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error")
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
