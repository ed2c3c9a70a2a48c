use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatChange {
    Claimed,
    Booked,
    Released,
}

/// Published on every ledger mutation; drives the live seat map.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeatsChangedEvent {
    pub show_id: Uuid,
    pub seat_ids: Vec<String>,
    pub change: SeatChange,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub user_ref: String,
    pub show_id: Uuid,
    pub seat_ids: Vec<String>,
    pub amount: i64,
    pub currency: String,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub user_ref: String,
    pub show_id: Uuid,
    pub refund_amount: i64,
    pub refund_percentage: u8,
    pub refund_status: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentFailedEvent {
    pub booking_id: Uuid,
    pub user_ref: String,
    pub show_id: Uuid,
    pub reason: String,
    pub timestamp: i64,
}
