//! Error types for folio.

use thiserror::Error;

/// Result type alias using folio's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for folio operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Note not found (or not visible to the acting user)
    #[error("Note not found: {0}")]
    NoteNotFound(i64),

    /// Image not found
    #[error("Image not found: {0}")]
    ImageNotFound(i64),

    /// The acting user referenced an image they do not own.
    ///
    /// `field` names the request field that carried the reference
    /// (`content` or `main_visual_id`).
    #[error("{}", image_not_owned_message(.field, .image_id))]
    ImageNotOwned { field: String, image_id: i64 },

    /// A request field failed validation.
    #[error("{message}")]
    Validation { field: String, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unique constraint clash (duplicate username, email, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn image_not_owned_message(field: &str, image_id: &i64) -> String {
    if field == "main_visual_id" {
        "You do not have permission to use this image.".to_string()
    } else {
        format!(
            "You do not have permission to use image with ID: {}",
            image_id
        )
    }
}

impl Error {
    /// Shorthand for a field validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending request field, when the error carries one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::ImageNotOwned { field, .. } | Error::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
