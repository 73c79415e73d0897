use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::controllers::{invalid_request, ApiError};
use crate::models::{SeatId, ShowId};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shows", get(list_shows))
        .route("/shows/{show_id}/seats", get(get_available_seats))
        .route("/shows/{show_id}/sold-out", get(get_sold_out))
        .route("/shows/{show_id}/quote", post(quote_seats))
}

// GET /api/shows?available=true
#[derive(Debug, Deserialize)]
struct ShowsQuery {
    available: Option<bool>,
}

async fn list_shows(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ShowsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let only_available = params.available.unwrap_or(false);
    let shows: Vec<_> = state
        .cache
        .get_upcoming_shows(&state.booking)
        .await?
        .into_iter()
        .filter(|s| !only_available || !s.is_sold_out())
        .collect();

    Ok((StatusCode::OK, Json(shows)))
}

// GET /api/shows/{show_id}/seats
async fn get_available_seats(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
) -> Result<impl IntoResponse, ApiError> {
    let seats = state.booking.available_seat_details(show_id).await?;
    Ok((StatusCode::OK, Json(seats)))
}

// GET /api/shows/{show_id}/sold-out
#[derive(Debug, Serialize)]
struct SoldOutResponse {
    show_id: ShowId,
    sold_out: bool,
}

async fn get_sold_out(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
) -> Result<impl IntoResponse, ApiError> {
    let sold_out = state.booking.is_sold_out(show_id).await?;
    Ok((StatusCode::OK, Json(SoldOutResponse { show_id, sold_out })))
}

// POST /api/shows/{show_id}/quote
#[derive(Debug, Deserialize, Validate)]
struct QuoteRequest {
    #[validate(length(max = 50))]
    seat_ids: Vec<SeatId>,
}

async fn quote_seats(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
    Json(req): Json<QuoteRequest>,
) -> Response {
    if let Err(e) = req.validate() {
        return invalid_request(&e);
    }

    match state.booking.quote(show_id, &req.seat_ids).await {
        Ok(quotes) => (StatusCode::OK, Json(quotes)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
