use crate::services::admission::AdmissionError;
use crate::services::retrieval::FileNotFound;
use crate::services::staging::StagingError;
use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),

    #[error("Too many files: at most {max} per request")]
    TooManyFiles { max: usize },

    #[error("Unexpected field: {0}")]
    UnexpectedField(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found")]
    NotFound(#[from] FileNotFound),
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::Staging(e.into())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(e: MultipartRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

fn internal(context: &str, detail: &dyn std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("{}: {}", context, detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(_) => {
                return (StatusCode::NOT_FOUND, "File not found.").into_response();
            }
            AppError::Staging(StagingError::Io(e)) => internal("Staging I/O error", &e),
            AppError::Staging(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Admission(AdmissionError::NoFiles) => {
                (StatusCode::BAD_REQUEST, "No files uploaded".to_string())
            }
            AppError::Admission(AdmissionError::QuotaExceeded { .. }) => {
                (StatusCode::BAD_REQUEST, "Storage quota exceeded".to_string())
            }
            AppError::Admission(AdmissionError::Infected { .. }) => (
                StatusCode::BAD_REQUEST,
                "Files are infected with malware".to_string(),
            ),
            AppError::Admission(AdmissionError::ScanFailure { reason }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error scanning files: {}", reason),
            ),
            AppError::Admission(AdmissionError::Storage(e)) => internal("Storage error", &e),
            e @ (AppError::TooManyFiles { .. }
            | AppError::UnexpectedField(_)
            | AppError::BadRequest(_)) => (StatusCode::BAD_REQUEST, e.to_string()),
        };

        let body = Json(json!({
            "message": message
        }));

        (status, body).into_response()
    }
}
