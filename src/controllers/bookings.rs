use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::controllers::{invalid_request, ApiError};
use crate::middleware::CallerId;
use crate::models::{BookingOutcome, SeatId, ShowId};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
}

// POST /api/bookings
#[derive(Debug, Deserialize, Validate)]
struct CreateBookingRequest {
    #[validate(range(min = 1))]
    show_id: ShowId,
    #[validate(length(max = 50))]
    seat_ids: Vec<SeatId>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Json(req): Json<CreateBookingRequest>,
) -> Response {
    if let Err(e) = req.validate() {
        return invalid_request(&e);
    }

    let outcome = match state.booking.book_seats(req.show_id, &req.seat_ids, user_id).await {
        Ok(outcome) => outcome,
        Err(e) => return ApiError(e).into_response(),
    };

    match outcome {
        BookingOutcome::Booked(booking) => {
            // Сеанс распродан - из афиши "доступных" его надо убрать
            if booking.sold_out {
                state.cache.invalidate_shows().await;
            }
            (StatusCode::CREATED, Json(booking)).into_response()
        }
        BookingOutcome::Conflict { unavailable } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "seats_unavailable",
                "message": "Some of the requested seats are already booked",
                "unavailable": unavailable,
            })),
        )
            .into_response(),
    }
}
