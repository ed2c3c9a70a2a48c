use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use marquee_booking::{BookingError, BookingView, CancellationReceipt, CreatedBooking, NewBooking};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CustomerClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub show_id: Uuid,
    pub seat_ids: Vec<String>,
    pub amount: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelBookingRequest {
    #[serde(default)]
    pub reason: String,
}

/// Customer routes. The caller wraps them in the auth layer.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/retry-payment", post(retry_payment))
}

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreatedBooking>), AppError> {
    let result = state
        .bookings
        .create_booking(NewBooking {
            user_ref: claims.sub,
            show_id: req.show_id,
            seat_ids: req.seat_ids,
            amount: req.amount,
        })
        .await;

    match result {
        Ok(created) => {
            state.metrics.bookings_created.inc();
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(e) => {
            if matches!(e, BookingError::SeatsUnavailable(_)) {
                state.metrics.bookings_rejected.inc();
            }
            Err(e.into())
        }
    }
}

/// GET /v1/bookings
async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    Ok(Json(state.bookings.list_bookings(&claims.sub).await?))
}

/// GET /v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>, AppError> {
    Ok(Json(state.bookings.get_booking(id, &claims.sub).await?))
}

/// POST /v1/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<Json<CancellationReceipt>, AppError> {
    let receipt = state.bookings.cancel_booking(id, &claims.sub, &req.reason).await?;
    state.metrics.bookings_cancelled.inc();
    Ok(Json(receipt))
}

/// POST /v1/bookings/{id}/retry-payment
async fn retry_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<CreatedBooking>, AppError> {
    let created = state.bookings.retry_payment(id, &claims.sub).await?;
    if created.booking_id != id {
        state.metrics.bookings_created.inc();
    }
    Ok(Json(created))
}
