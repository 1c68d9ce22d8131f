//! Typed error handling for the invitation service
//!
//! This module provides an error hierarchy that lets callers (REST handlers,
//! pages, the remote client) react to specific failures instead of a generic
//! `anyhow::Error`.
//!
//! # Error Categories
//!
//! - [`ValidationError`]: a required field is empty or malformed
//! - [`StorageError`]: the table store rejected a select/insert/delete
//! - [`RequestError`]: HTTP-level problems (bad path, missing API key)
//!
//! [`ConfigError`] and [`ClipboardError`] stay outside the hierarchy: the
//! first only reaches the binary through `anyhow`, the second only reaches the
//! generator page, which turns it into a notice.
//!
//! # Example
//!
//! ```rust,ignore
//! match build_invitation_link(site_url, "  ") {
//!     Err(InviteError::Validation(ValidationError::EmptyField { field })) => {
//!         println!("{} must not be empty", field);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//!     Ok(link) => println!("{}", link),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// The main error type of the crate
#[derive(Debug)]
pub enum InviteError {
    /// Input validation errors
    Validation(ValidationError),

    /// Table store errors
    Storage(StorageError),

    /// HTTP/Request errors
    Request(RequestError),

    /// Unexpected failures
    Internal(String),
}

impl fmt::Display for InviteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InviteError::Validation(e) => write!(f, "{}", e),
            InviteError::Storage(e) => write!(f, "{}", e),
            InviteError::Request(e) => write!(f, "{}", e),
            InviteError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for InviteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InviteError::Validation(e) => Some(e),
            InviteError::Storage(e) => Some(e),
            InviteError::Request(e) => Some(e),
            InviteError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl InviteError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            InviteError::Validation(_) => StatusCode::BAD_REQUEST,
            InviteError::Storage(e) => e.status_code(),
            InviteError::Request(e) => e.status_code(),
            InviteError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            InviteError::Validation(_) => "VALIDATION_ERROR",
            InviteError::Storage(e) => e.error_code(),
            InviteError::Request(e) => e.error_code(),
            InviteError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            InviteError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for InviteError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// A single field validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

/// Errors related to input validation
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// A required field is empty after trimming
    #[error("Field '{field}' must not be empty")]
    EmptyField { field: String },

    /// Multiple field validation errors
    #[error("Validation errors: {}", join_field_errors(.0))]
    FieldErrors(Vec<FieldValidationError>),
}

fn join_field_errors(errors: &[FieldValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldValidationError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldValidationError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ValidationError::FieldErrors(fields)
    }
}

impl From<ValidationError> for InviteError {
    fn from(err: ValidationError) -> Self {
        InviteError::Validation(err)
    }
}

impl From<validator::ValidationErrors> for InviteError {
    fn from(errors: validator::ValidationErrors) -> Self {
        InviteError::Validation(errors.into())
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by a table store (local or remote)
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Connection error
    #[error("Failed to connect to {backend}: {message}")]
    ConnectionError { backend: String, message: String },

    /// Query execution error
    #[error("{backend} query error: {message}")]
    QueryError { backend: String, message: String },

    /// The remote backend answered with an error payload
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

impl StorageError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StorageError::Rejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::ConnectionError { .. } => "STORAGE_CONNECTION_ERROR",
            StorageError::QueryError { .. } => "STORAGE_QUERY_ERROR",
            StorageError::Rejected { .. } => "BACKEND_REJECTED",
        }
    }
}

impl From<StorageError> for InviteError {
    fn from(err: StorageError) -> Self {
        InviteError::Storage(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to parse configuration
    #[error("Failed to parse configuration{}: {message}", describe_file(.file))]
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Missing required value
    #[error("Missing required configuration '{field}' ({context})")]
    MissingField { field: String, context: String },

    /// Invalid value
    #[error("Invalid value '{value}' for '{field}': {message}")]
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    /// IO error while reading configuration
    #[error("IO error: {message}")]
    IoError { message: String },
}

fn describe_file(file: &Option<String>) -> String {
    file.as_ref().map(|f| format!(" '{}'", f)).unwrap_or_default()
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to HTTP requests
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Invalid row ID format
    #[error("Invalid row ID format: '{id}'")]
    InvalidRowId { id: String },

    /// Invalid query parameter
    #[error("Invalid query parameter '{name}': {message}")]
    InvalidQuery { name: String, message: String },

    /// Invalid request body
    #[error("Invalid request body: {message}")]
    InvalidBody { message: String },

    /// Missing or wrong API key
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::InvalidRowId { .. } => StatusCode::BAD_REQUEST,
            RequestError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            RequestError::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            RequestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidRowId { .. } => "INVALID_ROW_ID",
            RequestError::InvalidQuery { .. } => "INVALID_QUERY",
            RequestError::InvalidBody { .. } => "INVALID_BODY",
            RequestError::Unauthorized { .. } => "UNAUTHORIZED",
        }
    }
}

impl From<RequestError> for InviteError {
    fn from(err: RequestError) -> Self {
        InviteError::Request(err)
    }
}

// =============================================================================
// Clipboard Errors
// =============================================================================

/// The clipboard could not be written
#[derive(Debug, thiserror::Error)]
#[error("Clipboard unavailable: {message}")]
pub struct ClipboardError {
    pub message: String,
}

// =============================================================================
// Conversions from external errors
// =============================================================================

/// Services report through `anyhow`; recover the typed error when there is one
impl From<anyhow::Error> for InviteError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<InviteError>() {
            Ok(invite_err) => invite_err,
            Err(err) => match err.downcast::<StorageError>() {
                Ok(storage_err) => InviteError::Storage(storage_err),
                Err(err) => match err.downcast::<ValidationError>() {
                    Ok(validation_err) => InviteError::Validation(validation_err),
                    Err(err) => InviteError::Internal(err.to_string()),
                },
            },
        }
    }
}

/// A specialized Result type for typed operations
pub type InviteResult<T> = Result<T, InviteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_is_400() {
        let err = InviteError::Validation(ValidationError::EmptyField {
            field: "guest_name".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(err.to_string(), "Field 'guest_name' must not be empty");
    }

    #[test]
    fn test_rejected_keeps_backend_text() {
        let err = InviteError::Storage(StorageError::Rejected {
            status: 401,
            message: "Invalid API key".to_string(),
        });
        assert_eq!(err.to_string(), "Invalid API key");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_anyhow_roundtrip_keeps_category() {
        let err: anyhow::Error = StorageError::QueryError {
            backend: "PostgreSQL".to_string(),
            message: "relation does not exist".to_string(),
        }
        .into();
        let typed = InviteError::from(err);
        assert_eq!(typed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(typed.error_code(), "STORAGE_QUERY_ERROR");

        let untyped = InviteError::from(anyhow::anyhow!("boom"));
        assert!(matches!(untyped, InviteError::Internal(_)));
    }

    #[test]
    fn test_config_parse_error_mentions_file() {
        let err = ConfigError::ParseError {
            file: Some("invite.yaml".to_string()),
            message: "bad indent".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse configuration 'invite.yaml': bad indent"
        );
    }
}
