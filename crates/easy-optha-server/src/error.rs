use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use easy_optha_core::db::DbError;
use serde_json::json;
use thiserror::Error;

/// Errors raised while starting the service.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors returned by request handlers. Rendered as `{"error": ...}`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("All fields are required")]
    MissingFields,

    #[error("Malformed payload")]
    MalformedPayload,

    #[error("{0}")]
    InvalidPatientId(String),

    #[error("Failed to add scan")]
    AddScanFailed(#[source] DbError),

    #[error("Failed to fetch patient history")]
    HistoryFetchFailed(#[source] DbError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MissingFields
            | AppError::MalformedPayload
            | AppError::InvalidPatientId(_) => StatusCode::BAD_REQUEST,
            AppError::AddScanFailed(_) | AppError::HistoryFetchFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
