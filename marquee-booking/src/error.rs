use marquee_core::{BookingStatus, CoreError, TransitionError};
use uuid::Uuid;

/// Everything a booking operation can report to its caller.
///
/// Collaborator failures are folded into `PaymentUnavailable` or `Internal` so no
/// store- or gateway-specific error shape escapes the engine.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Seats unavailable: {}", .0.join(", "))]
    SeatsUnavailable(Vec<String>),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Booking {booking_id} is already {status}")]
    StaleTransition {
        booking_id: Uuid,
        status: BookingStatus,
    },

    #[error("Payment session expired, please book again")]
    RetryWindowExpired,

    #[error("Show {0} has already started")]
    ShowStarted(Uuid),

    #[error("Booking {0} belongs to another user")]
    NotOwner(Uuid),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Show not found: {0}")]
    ShowNotFound(Uuid),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Payment provider unavailable: {0}")]
    PaymentUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for BookingError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => BookingError::Validation(msg),
            CoreError::GatewayError(msg) => BookingError::PaymentUnavailable(msg),
            other => BookingError::Internal(other.to_string()),
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
