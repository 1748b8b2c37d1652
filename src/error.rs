use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_triple_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// Top-level gateway error that composes all subsystem errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Store-facing errors (classification, execution, serialization)
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Caller lacks a role permitted to perform updates
    #[error("authorization error: caller has none of the permitted roles")]
    Authorization,

    /// The update channel is closed; the gateway is shutting down
    #[error("update channel closed")]
    ChannelClosed,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Store(StoreError::Parse { .. })
            | GatewayError::Store(StoreError::UnsupportedOperationType { .. }) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Store(StoreError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Authorization => StatusCode::FORBIDDEN,
            GatewayError::ChannelClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
