use axum::{
    Json,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Postgres SQLSTATE for unique constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Generic message shown when something failed that the user cannot fix.
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred. Please try again.";

/// RepoError
///
/// Persistence failures as seen by the handlers. Unique violations are split out so
/// each handler can translate them into its own user-facing message.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("unique constraint violated ({})", constraint.as_deref().unwrap_or("unknown"))]
    UniqueViolation { constraint: Option<String> },

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl RepoError {
    pub fn unique(constraint: &str) -> Self {
        Self::UniqueViolation {
            constraint: Some(constraint.to_string()),
        }
    }

    /// True when the error is a unique violation, optionally on a specific constraint.
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match (self, constraint) {
            (Self::UniqueViolation { .. }, None) => true,
            (Self::UniqueViolation { constraint: found }, Some(wanted)) => {
                found.as_deref() == Some(wanted)
            }
            _ => false,
        }
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return Self::UniqueViolation {
                    constraint: db_err.constraint().map(str::to_string),
                };
            }
        }
        Self::Database(err)
    }
}

/// ApiError
///
/// Every failure a handler can return. Rendered as `{"error": "<message>"}` with the
/// matching status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Repository(RepoError::UniqueViolation { .. }) => StatusCode::CONFLICT,
            Self::Repository(RepoError::Database(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message sent to the client. Internal details never leave the server.
    pub fn public_message(&self) -> String {
        match self {
            Self::Repository(RepoError::UniqueViolation { .. }) => {
                "Record already exists".to_string()
            }
            Self::Repository(RepoError::Database(_)) | Self::Internal(_) => {
                UNEXPECTED_ERROR.to_string()
            }
            other => other.to_string(),
        }
    }
}

// --- Extractor Rejections ---
//
// Malformed bodies, path segments and query strings are client errors: 400 with the
// extractor's own explanation.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(format!("Invalid path: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(format!("Invalid upload: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
