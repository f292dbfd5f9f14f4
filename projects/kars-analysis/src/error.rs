//! Request-level failures and their HTTP rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Failures that end a request. Per-axis problems never show up here; they
/// degrade into "No Detection" results instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid JSON in request body")]
    InvalidJson,

    #[error("Missing videoUrl in request body")]
    MissingInput,

    #[error("Video not downloaded")]
    DownloadFailed { details: Option<String> },

    #[error("Video is empty")]
    EmptyVideo,

    #[error("Conversion to MP4 failed")]
    ConversionFailed { details: String },

    #[error("Analysis failed")]
    AnalysisFailed { details: String },
}

impl AnalysisError {
    pub fn download(details: impl Into<String>) -> Self {
        Self::DownloadFailed {
            details: Some(details.into()),
        }
    }

    pub fn conversion(details: impl Into<String>) -> Self {
        Self::ConversionFailed {
            details: details.into(),
        }
    }

    pub fn analysis(details: impl Into<String>) -> Self {
        Self::AnalysisFailed {
            details: details.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AnalysisError::InvalidJson | AnalysisError::MissingInput => StatusCode::BAD_REQUEST,
            AnalysisError::DownloadFailed { .. }
            | AnalysisError::EmptyVideo
            | AnalysisError::ConversionFailed { .. }
            | AnalysisError::AnalysisFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            AnalysisError::DownloadFailed { details } => details.as_deref(),
            AnalysisError::ConversionFailed { details } | AnalysisError::AnalysisFailed { details } => {
                Some(details)
            }
            AnalysisError::InvalidJson | AnalysisError::MissingInput | AnalysisError::EmptyVideo => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            details: self.details().map(str::to_string),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}: {}", self, self.details().unwrap_or("-"));
        }
        (status, Json(self.body())).into_response()
    }
}
