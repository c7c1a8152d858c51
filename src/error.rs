use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::video::format::PixelFormat;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(PixelFormat),

    #[error("Encoder reconfiguration failed: {0}")]
    Reconfigure(String),

    #[error("Buffer allocation failed: {0}")]
    AllocFailed(String),

    #[error("DMA cache sync failed: {0}")]
    DmaSync(String),

    #[error("Frame submission failed: {0}")]
    SubmitFailed(String),

    #[error("Packet retrieval failed: {0}")]
    RetrieveFailed(String),

    #[error("Encoder returned an empty packet")]
    EmptyPacket,

    #[error("Frame of {got} bytes exceeds buffer of {max} bytes")]
    OversizedFrame { got: usize, max: usize },

    #[error("Background image too large: {width}x{height}")]
    BackgroundTooLarge { width: u32, height: u32 },

    #[error("JPEG decode failed: {0}")]
    JpegDecode(String),

    #[error("Font load failed: {0}")]
    FontLoad(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Video error: {0}")]
    VideoError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error response body (unified success format)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        tracing::error!(error_message = %body.message, "Request failed");

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
