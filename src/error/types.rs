use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Body sent for every 5xx; the detailed message only goes to the log.
pub const GENERIC_SERVER_ERROR: &str = "Error converting images to PDF";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No images uploaded")]
    NoImages,

    #[error("Invalid upload: {message}")]
    InvalidUpload { message: String },

    #[error("Failed to decode {file}: {message}")]
    DecodeFailed { file: String, message: String },

    #[error("Rate limit exceeded: maximum concurrent conversions reached")]
    RateLimitExceeded,

    #[error("PDF assembly failed: {message}")]
    Assembly { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NoImages => "NO_IMAGES",
            AppError::InvalidUpload { .. } => "INVALID_UPLOAD",
            AppError::DecodeFailed { .. } => "DECODE_FAILED",
            AppError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AppError::Assembly { .. } => "ASSEMBLY_ERROR",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NoImages => StatusCode::BAD_REQUEST,
            AppError::InvalidUpload { .. } => StatusCode::BAD_REQUEST,
            AppError::DecodeFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Assembly { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text body the client sees. Server errors never leak detail.
    pub fn client_message(&self) -> String {
        if self.status_code().is_server_error() {
            GENERIC_SERVER_ERROR.to_string()
        } else {
            self.to_string()
        }
    }
}

/// Logged from inside the handler, so the `request` span opened by the
/// logging middleware supplies the request id.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = error_code,
                status_code = %status,
                error_message = %message,
                "Request failed"
            );
        } else {
            tracing::warn!(
                error_code = error_code,
                status_code = %status,
                error_message = %message,
                "Request rejected"
            );
        }

        (status, self.client_message()).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<lopdf::Error> for AppError {
    fn from(err: lopdf::Error) -> Self {
        AppError::Assembly {
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal {
            message: format!("Conversion task failed: {}", err),
        }
    }
}

impl AppError {
    pub fn invalid_upload(message: impl Into<String>) -> Self {
        AppError::InvalidUpload {
            message: message.into(),
        }
    }

    pub fn decode(file: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::DecodeFailed {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn assembly(message: impl Into<String>) -> Self {
        AppError::Assembly {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }
}
