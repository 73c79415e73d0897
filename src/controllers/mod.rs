pub mod shows;
pub mod bookings;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::BookingError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(shows::routes())
        .merge(bookings::routes())
}

/// 400 с тем же телом, что и у ошибок валидации ядра.
pub fn invalid_request(e: &validator::ValidationErrors) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "validation", "message": e.to_string() })),
    )
        .into_response()
}

/// Ответ API на ошибку ядра бронирования.
pub struct ApiError(pub BookingError);

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::Transient { .. } => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::CommitAmbiguous { .. } | BookingError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self.0 {
            BookingError::Validation(e) => json!({ "error": "validation", "message": e.to_string() }),
            BookingError::Transient { .. } => {
                json!({ "error": "unavailable", "message": "Storage is temporarily unavailable, try again" })
            }
            BookingError::CommitAmbiguous { show_id, .. } => {
                tracing::error!("Ambiguous booking outcome surfaced to client: {}", self.0);
                json!({
                    "error": "outcome_unknown",
                    "message": "Booking may or may not have been stored; check your bookings before retrying",
                    "show_id": show_id,
                })
            }
            BookingError::Storage(e) => {
                tracing::error!("Storage failure: {}", e);
                json!({ "error": "internal", "message": "Internal storage error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
