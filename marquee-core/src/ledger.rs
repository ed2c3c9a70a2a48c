use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::seat::SeatId;
use crate::CoreResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatState {
    Held,
    Booked,
}

impl SeatState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatState::Held => "held",
            SeatState::Booked => "booked",
        }
    }
}

/// One entry of a show's occupied-seats map. Absence from the map means free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupiedSeat {
    pub seat_id: SeatId,
    pub holder: Uuid,
    pub state: SeatState,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    /// Nothing was written; these requested seats were already taken.
    Unavailable(Vec<SeatId>),
}

/// Authoritative per-show seat occupancy.
///
/// `claim` is all-or-nothing and must be linearizable against concurrent claims
/// on overlapping seats. Transient write contention is reported as
/// `CoreError::Conflict` so the caller can retry.
#[async_trait]
pub trait SeatLedger: Send + Sync {
    async fn claim(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<ClaimOutcome>;

    /// Frees the seats `holder` currently occupies. Seats that are already free,
    /// or held by someone else, are left alone.
    async fn release(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<()>;

    /// Promotes `holder`'s entries from held to booked.
    async fn mark_booked(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<()>;

    /// Pre-flight check only. Never use this to decide a claim.
    async fn is_free(&self, show_id: Uuid, seat_ids: &[SeatId]) -> CoreResult<bool>;

    async fn occupied(&self, show_id: Uuid) -> CoreResult<Vec<OccupiedSeat>>;
}
