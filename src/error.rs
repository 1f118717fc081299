// error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

/// Outcomes that end a webhook request early. Failures while tagging are
/// not represented here; they are logged and the delivery is acknowledged.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook signature verification failed")]
    Unauthorized,
    #[error("invalid order payload: {0}")]
    BadRequest(#[from] serde_json::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebhookError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = match &self {
            WebhookError::Unauthorized => "Unauthorized",
            WebhookError::BadRequest(_) => "Invalid JSON",
            WebhookError::Internal(e) => {
                error!("Unexpected error handling webhook: {:#}", e);
                "Internal Server Error"
            }
        };
        (self.status(), body).into_response()
    }
}
