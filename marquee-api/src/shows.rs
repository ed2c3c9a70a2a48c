use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OccupiedSeatsResponse {
    pub show_id: Uuid,
    pub seat_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Comma separated, e.g. `A1,A2`.
    pub seats: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// Public seat-map routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/shows/{id}/occupied-seats", get(occupied_seats))
        .route("/v1/shows/{id}/seats/availability", get(seat_availability))
        .route("/v1/shows/{id}/seats/stream", get(seat_stream))
}

/// GET /v1/shows/{id}/occupied-seats
async fn occupied_seats(
    State(state): State<AppState>,
    Path(show_id): Path<Uuid>,
) -> Result<Json<OccupiedSeatsResponse>, AppError> {
    let seat_ids = state.bookings.occupied_seats(show_id).await?;
    Ok(Json(OccupiedSeatsResponse { show_id, seat_ids }))
}

/// GET /v1/shows/{id}/seats/availability?seats=A1,A2
///
/// Advisory only; the claim on booking creation is what counts.
async fn seat_availability(
    State(state): State<AppState>,
    Path(show_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let seats: Vec<String> = query
        .seats
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let available = state.bookings.seats_available(show_id, &seats).await?;
    Ok(Json(AvailabilityResponse { available }))
}

/// GET /v1/shows/{id}/seats/stream
async fn seat_stream(
    State(state): State<AppState>,
    Path(show_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.bookings.subscribe_seat_changes();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.show_id == show_id => match Event::default().event("seats").json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    tracing::warn!("Failed to encode seat event: {}", e);
                    None
                }
            },
            Ok(_) => None,
            // Slow consumer; the client re-syncs from occupied-seats
            Err(e) => {
                tracing::debug!(show_id = %show_id, "seat stream lagged: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
