//! HTTP error type and status mapping.

use crate::upload::UploadError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use docgraph_extractor::ExtractorError;
use docgraph_store::StoreError;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Application error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Malformed request or rejected upload (400)
    BadRequest(String),
    /// Unknown document or version (404)
    NotFound(String),
    /// Document changed underneath the request (409)
    Conflict(String),
    /// Request body over the upload limit (413)
    PayloadTooLarge(String),
    /// Text could not be extracted from the file (422)
    Unprocessable(String),
    /// LLM backend down and fallback disabled (503)
    Unavailable(String),
    /// Internal server error (500)
    Internal(String),
}

impl AppError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error message
    pub fn message(&self) -> &str {
        match self {
            AppError::BadRequest(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m)
            | AppError::PayloadTooLarge(m)
            | AppError::Unprocessable(m)
            | AppError::Unavailable(m)
            | AppError::Internal(m) => m,
        }
    }

    /// Prefix the message with the operation that failed
    pub fn during(self, operation: impl std::fmt::Display) -> Self {
        let wrap = |m: String| format!("{}: {}", operation, m);
        match self {
            AppError::BadRequest(m) => AppError::BadRequest(wrap(m)),
            AppError::NotFound(m) => AppError::NotFound(wrap(m)),
            AppError::Conflict(m) => AppError::Conflict(wrap(m)),
            AppError::PayloadTooLarge(m) => AppError::PayloadTooLarge(wrap(m)),
            AppError::Unprocessable(m) => AppError::Unprocessable(wrap(m)),
            AppError::Unavailable(m) => AppError::Unavailable(wrap(m)),
            AppError::Internal(m) => AppError::Internal(wrap(m)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.message(), "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.message(), "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.message().to_string(),
        });
        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DocumentNotFound(_) | StoreError::VersionNotFound { .. } => {
                AppError::NotFound(e.to_string())
            }
            StoreError::InvalidArgument(_) => AppError::BadRequest(e.to_string()),
            StoreError::DocumentChanged(_) => AppError::Conflict(e.to_string()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<ExtractorError> for AppError {
    fn from(e: ExtractorError) -> Self {
        match e {
            ExtractorError::UnsupportedFileType(_) => AppError::BadRequest(e.to_string()),
            ExtractorError::Extraction { .. } => AppError::Unprocessable(e.to_string()),
            ExtractorError::BackendUnavailable(_) => AppError::Unavailable(e.to_string()),
            ExtractorError::InvalidGraphShape(_) | ExtractorError::Config(_) => {
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(e.body_text())
        } else {
            AppError::BadRequest(e.body_text())
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_domain::FileType;

    #[test]
    fn test_store_error_mapping() {
        assert_eq!(
            AppError::from(StoreError::DocumentNotFound(3)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(StoreError::VersionNotFound {
                document_id: 3,
                version: 9
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(StoreError::InvalidArgument("keep".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(StoreError::VersionConflict(3)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(StoreError::DocumentChanged(3)).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_extractor_error_mapping() {
        assert_eq!(
            AppError::from(ExtractorError::UnsupportedFileType("exe".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(ExtractorError::Extraction {
                file_type: FileType::Pdf,
                message: "corrupt".into()
            })
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(ExtractorError::BackendUnavailable("down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_during_keeps_status() {
        let err = AppError::from(StoreError::DocumentNotFound(12)).during("get graph");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "get graph: Document not found: 12");
    }
}
