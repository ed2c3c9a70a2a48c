pub mod booking;
pub mod ledger;
pub mod notify;
pub mod payment;
pub mod policy;
pub mod repository;
pub mod seat;
pub mod show;

pub use booking::{Booking, BookingStatus, Cancellation, FailureReason, RefundStatus, TransitionError};
pub use policy::BookingRules;
pub use seat::SeatId;
pub use show::{PriceTiers, Show};

/// Failures reported by collaborators (stores, gateway, notification sinks).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Payment gateway error: {0}")]
    GatewayError(String),
    #[error("Notification error: {0}")]
    NotificationError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
