//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

/// Error returned by handlers, rendered as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// Unexpected failure; the detail is logged, not returned.
    Internal(folio_core::Error),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    /// Validation or ownership failure tied to a request field.
    Unprocessable {
        message: String,
        field: Option<String>,
    },
}

impl ApiError {
    pub fn unprocessable(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Unprocessable {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl From<folio_core::Error> for ApiError {
    fn from(err: folio_core::Error) -> Self {
        use folio_core::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::NoteNotFound(_) => ApiError::NotFound("Note not found.".to_string()),
            Error::ImageNotFound(_) => ApiError::NotFound("Image not found.".to_string()),
            err @ Error::ImageNotOwned { .. } => ApiError::Unprocessable {
                message: err.to_string(),
                field: err.field().map(str::to_string),
            },
            Error::Validation { field, message } => ApiError::Unprocessable {
                message,
                field: Some(field),
            },
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Internal(err) => {
                error!(subsystem = "api", error = %err, "Request failed");
                serde_json::json!({ "error": "Internal server error" })
            }
            ApiError::Unprocessable { message, field } => match field {
                Some(field) => serde_json::json!({ "error": message, "field": field }),
                None => serde_json::json!({ "error": message }),
            },
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => serde_json::json!({ "error": msg }),
        };
        (status, Json(body)).into_response()
    }
}
