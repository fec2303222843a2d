use super::flash::redirect_with_flash;
use super::AppState;
use crate::error::{ErrorKind, Svg2StlError};
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error as ThisError;

/// Everything that can go wrong while handling an upload.
///
/// None of these escape as a 5xx: except for an oversized body, each one is
/// turned into a flash message and a redirect back to the form.
#[derive(ThisError, Debug)]
pub enum Error {
    /// The request itself is unusable (no file, wrong extension)
    #[error("{message}")]
    Rejected { message: String },

    /// The converter refused or failed
    #[error(transparent)]
    Conversion(#[from] Svg2StlError),

    /// Body exceeded the configured upload limit
    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// Generic internal service error
    #[error("Failed to {operation}: {detail}")]
    Internal { operation: String, detail: String },
}

impl Error {
    pub fn no_file() -> Self {
        Error::Rejected {
            message: "No file selected".to_string(),
        }
    }

    pub fn wrong_type() -> Self {
        Error::Rejected {
            message: "Invalid file type. Please upload an SVG file.".to_string(),
        }
    }

    pub fn internal(operation: &str, detail: impl std::fmt::Display) -> Self {
        Error::Internal {
            operation: operation.to_string(),
            detail: detail.to_string(),
        }
    }

    pub fn from_multipart(err: MultipartError, limit: usize) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Error::PayloadTooLarge { limit }
        } else {
            Error::internal("read upload", err.body_text())
        }
    }

    /// Message shown to the end user. Internal details only appear in debug mode.
    pub fn user_message(&self, debug: bool) -> String {
        match self {
            Error::Rejected { message } => message.clone(),
            Error::PayloadTooLarge { limit } => {
                format!("File too large. The limit is {} MB.", limit / (1024 * 1024))
            }
            Error::Conversion(e) if e.kind() != ErrorKind::Internal => {
                format!("Conversion failed: {e}")
            }
            Error::Conversion(_) | Error::Internal { .. } => {
                if debug {
                    format!("Upload failed: {self}")
                } else {
                    "Upload failed: internal error".to_string()
                }
            }
        }
    }

    fn log(&self) {
        match self {
            Error::Rejected { .. } => tracing::debug!("Upload rejected: {}", self),
            Error::PayloadTooLarge { .. } => tracing::info!("Upload rejected: {}", self),
            Error::Internal { .. } => tracing::error!("Internal service error: {:#}", self),
            Error::Conversion(e) => match e.kind() {
                ErrorKind::Input => tracing::debug!("Conversion rejected input: {}", e),
                ErrorKind::Environment => {
                    tracing::warn!("Deployment problem, conversion impossible: {}", e)
                }
                ErrorKind::Execution | ErrorKind::Timeout => {
                    tracing::warn!("Conversion failed: {}", e)
                }
                ErrorKind::Internal => tracing::error!("Internal service error: {:#}", e),
            },
        }
    }

    /// Log, then render as a redirect-with-flash (or a bare 413).
    pub fn into_response_with(self, state: &AppState) -> Response {
        self.log();
        match self {
            Error::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.user_message(false)).into_response()
            }
            _ => redirect_with_flash(&state.flash, "/", &self.user_message(state.config.debug)),
        }
    }
}
