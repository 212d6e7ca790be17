use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// One rejected input field, shaped like the schema errors the web client already renders.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub message: String,
    pub path: Vec<String>,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl FieldError {
    pub fn required(field: &str) -> Self {
        Self {
            message: format!("\"{field}\" is required"),
            path: vec![field.to_string()],
            kind: "any.required",
        }
    }

    pub fn empty(field: &str) -> Self {
        Self {
            message: format!("\"{field}\" is not allowed to be empty"),
            path: vec![field.to_string()],
            kind: "string.empty",
        }
    }

    pub fn invalid_email(field: &str) -> Self {
        Self {
            message: format!("\"{field}\" must be a valid email"),
            path: vec![field.to_string()],
            kind: "string.email",
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Schema Validation Error")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Not found {0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Token not found or expired")]
    TokenNotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::EmailAlreadyExists => StatusCode::CONFLICT,
            AuthError::NotFound(_) | AuthError::TokenNotFound => StatusCode::NOT_FOUND,
            AuthError::Unauthorized(_) | AuthError::TokenInvalid => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::BadRequest(_) => "BAD_REQUEST",
            AuthError::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::Unauthorized(_) => "UNAUTHORIZED",
            AuthError::TokenInvalid => "TOKEN_INVALID",
            AuthError::TokenNotFound => "TOKEN_NOT_FOUND",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    kind: &'static str,
    error_name: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AuthError::Internal(e) => {
                error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            kind: self.kind(),
            error_name: status.canonical_reason().unwrap_or("Error"),
            message,
            details: match self {
                AuthError::Validation(details) => Some(details),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Failures reported by a user store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write would duplicate a unique column (email).
    #[error("unique constraint violated")]
    UniqueViolation,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation => AuthError::EmailAlreadyExists,
            StoreError::Database(e) => AuthError::Internal(anyhow::Error::new(e).context("user store")),
        }
    }
}
