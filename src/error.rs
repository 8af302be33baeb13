use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use uuid::Uuid;

use crate::model_client::ModelError;
use crate::models::ErrorBody;

/// Failures that cross the HTTP boundary.
///
/// Unparseable model output is not one of them: it is recovered by the
/// normalizer and answered with the fallback record.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No chat content provided")]
    MissingChatContent,

    #[error("Error analyzing chat: {0}")]
    Upstream(#[from] ModelError),

    /// Analyze body that is not JSON or has the wrong shape
    #[error("Error analyzing chat: {}", .0.body_text())]
    UnreadableAnalysis(JsonRejection),

    #[error("Invalid request body: {}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),

    #[error("Deck not found: {0}")]
    DeckNotFound(Uuid),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingChatContent => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) | ApiError::UnreadableAnalysis(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::DeckNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
