use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use toggled_lib::FlagError;

/// Wraps service errors so handlers can return them directly.
#[derive(Debug)]
pub struct ApiError(pub FlagError);

impl From<FlagError> for ApiError {
    fn from(e: FlagError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            FlagError::Validation { .. } => (StatusCode::BAD_REQUEST, self.0.to_string()),
            FlagError::NotFound { .. } => (StatusCode::NOT_FOUND, self.0.to_string()),
            FlagError::Storage(e) => {
                tracing::error!(error = %e, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
