use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::seat::SeatId;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    PaymentFailed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::PaymentFailed => "payment_failed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// pending → confirmed | payment_failed, confirmed → cancelled. Nothing else.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::PaymentFailed)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "payment_failed" => Ok(BookingStatus::PaymentFailed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

/// Why a pending booking ended in `payment_failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Declined,
    SessionExpired,
    HoldExpired,
    CheckoutUnavailable,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Declined => "declined",
            FailureReason::SessionExpired => "session_expired",
            FailureReason::HoldExpired => "hold_expired",
            FailureReason::CheckoutUnavailable => "checkout_unavailable",
        }
    }
}

impl FromStr for FailureReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "declined" => Ok(FailureReason::Declined),
            "session_expired" => Ok(FailureReason::SessionExpired),
            "hold_expired" => Ok(FailureReason::HoldExpired),
            "checkout_unavailable" => Ok(FailureReason::CheckoutUnavailable),
            other => Err(format!("unknown failure reason '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Processing,
    Completed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Processing => "processing",
            RefundStatus::Completed => "completed",
        }
    }
}

impl FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(RefundStatus::Processing),
            "completed" => Ok(RefundStatus::Completed),
            other => Err(format!("unknown refund status '{}'", other)),
        }
    }
}

/// Stamped onto a booking when it is cancelled after payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cancellation {
    pub cancelled_at: DateTime<Utc>,
    pub reason: String,
    pub refund_amount: i64,
    pub refund_percentage: u8,
    pub refund_status: RefundStatus,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid state transition from {from} to {to}")]
pub struct TransitionError {
    pub from: BookingStatus,
    pub to: BookingStatus,
}

/// One party's claim on a set of seats for one show.
///
/// Invariants kept by the transition methods:
/// `status == Confirmed` ⇔ `paid` ⇔ `paid_at.is_some()` (a cancelled booking keeps
/// its payment stamp), and `seat_ids` never changes after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_ref: String,
    pub show_id: Uuid,
    seat_ids: Vec<SeatId>,
    pub amount: i64,
    pub currency: String,
    pub paid: bool,
    pub status: BookingStatus,
    pub payment_session_ref: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<FailureReason>,
    pub cancellation: Option<Cancellation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new_pending(
        id: Uuid,
        user_ref: String,
        show_id: Uuid,
        seat_ids: Vec<SeatId>,
        amount: i64,
        currency: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_ref,
            show_id,
            seat_ids,
            amount,
            currency,
            paid: false,
            status: BookingStatus::Pending,
            payment_session_ref: None,
            paid_at: None,
            failure_reason: None,
            cancellation: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a booking from persisted columns. Only stores should call this.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        user_ref: String,
        show_id: Uuid,
        seat_ids: Vec<SeatId>,
        amount: i64,
        currency: String,
        paid: bool,
        status: BookingStatus,
        payment_session_ref: Option<String>,
        paid_at: Option<DateTime<Utc>>,
        failure_reason: Option<FailureReason>,
        cancellation: Option<Cancellation>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_ref,
            show_id,
            seat_ids,
            amount,
            currency,
            paid,
            status,
            payment_session_ref,
            paid_at,
            failure_reason,
            cancellation,
            created_at,
            updated_at,
        }
    }

    pub fn seat_ids(&self) -> &[SeatId] {
        &self.seat_ids
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_some()
    }

    pub fn is_owned_by(&self, user_ref: &str) -> bool {
        self.user_ref == user_ref
    }

    pub fn attach_session(&mut self, session_ref: String, now: DateTime<Utc>) {
        self.payment_session_ref = Some(session_ref);
        self.updated_at = now;
    }

    /// Transition: Pending → Confirmed (payment captured)
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.guard(BookingStatus::Confirmed)?;
        self.paid = true;
        self.paid_at = Some(now);
        self.status = BookingStatus::Confirmed;
        self.updated_at = now;
        Ok(())
    }

    /// Transition: Pending → PaymentFailed (declined, expired, or hold timed out)
    pub fn fail(&mut self, reason: FailureReason, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.guard(BookingStatus::PaymentFailed)?;
        self.failure_reason = Some(reason);
        self.status = BookingStatus::PaymentFailed;
        self.updated_at = now;
        Ok(())
    }

    /// Transition: Confirmed → Cancelled (user action, refund stamped)
    pub fn cancel(&mut self, cancellation: Cancellation) -> Result<(), TransitionError> {
        self.guard(BookingStatus::Cancelled)?;
        self.updated_at = cancellation.cancelled_at;
        self.cancellation = Some(cancellation);
        self.status = BookingStatus::Cancelled;
        Ok(())
    }

    fn guard(&self, to: BookingStatus) -> Result<(), TransitionError> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(TransitionError { from: self.status, to })
        }
    }
}
