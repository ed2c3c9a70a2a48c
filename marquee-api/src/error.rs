use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marquee_booking::BookingError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    SeatsUnavailable(Vec<String>),
    GoneError(String),
    UnprocessableError(String),
    BadGatewayError(String),
    InternalServerError(String),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::SeatsUnavailable(seats) => AppError::SeatsUnavailable(seats),
            BookingError::InvalidTransition(_) | BookingError::StaleTransition { .. } => {
                AppError::ConflictError(message)
            }
            BookingError::RetryWindowExpired => AppError::GoneError(message),
            BookingError::ShowStarted(_) => AppError::UnprocessableError(message),
            BookingError::NotOwner(_) => AppError::AuthorizationError(message),
            BookingError::BookingNotFound(_) | BookingError::ShowNotFound(_) => AppError::NotFoundError(message),
            BookingError::Validation(msg) => AppError::ValidationError(msg),
            BookingError::PaymentUnavailable(_) => AppError::BadGatewayError(message),
            BookingError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::SeatsUnavailable(seats) => {
                let body = Json(json!({
                    "error": "Seats unavailable",
                    "unavailable_seats": seats,
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::GoneError(msg) => (StatusCode::GONE, msg),
            AppError::UnprocessableError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::BadGatewayError(msg) => {
                tracing::warn!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment provider unavailable, please try again".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
