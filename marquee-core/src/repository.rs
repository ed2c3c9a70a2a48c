use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::show::Show;
use crate::CoreResult;

/// Repository trait for booking records
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: &Booking) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    /// Newest first.
    async fn list_for_user(&self, user_ref: &str) -> CoreResult<Vec<Booking>>;

    /// Unpaid pending bookings created before `created_before`.
    async fn list_stale_pending(&self, created_before: DateTime<Utc>) -> CoreResult<Vec<Booking>>;

    /// Compare-and-set: overwrite the stored record with `booking` only if the
    /// stored status is still `expected`. Returns whether the write happened.
    async fn replace_if_status(&self, booking: &Booking, expected: BookingStatus) -> CoreResult<bool>;
}

/// Read-only view of the show schedule owned by the catalog service.
#[async_trait]
pub trait ShowCatalog: Send + Sync {
    async fn get_show(&self, show_id: Uuid) -> CoreResult<Option<Show>>;
}

/// Gateway event ids whose transition has been applied and stored.
#[async_trait]
pub trait ProcessedEventLog: Send + Sync {
    async fn contains(&self, event_id: &str) -> CoreResult<bool>;

    /// Only called after the event's transition has committed.
    async fn record(&self, event_id: &str) -> CoreResult<()>;
}
