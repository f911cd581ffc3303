//! Error types for the feed API.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ddfeed_core::FeedError;

/// Message returned in place of internal failure details.
const INTERNAL_MESSAGE: &str = "internal server error";

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The coordinator rejected or failed the operation.
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// The request body was not valid JSON for the endpoint.
    #[error("invalid body: {0}")]
    InvalidBody(#[from] JsonRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Feed(FeedError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Feed(FeedError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Feed(FeedError::Store(e)) => {
                tracing::error!(error = %e, "Request failed on the store");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_owned())
            }
            Self::InvalidBody(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
