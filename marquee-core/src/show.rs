use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ticket prices by seat class, in whole currency units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceTiers {
    pub economy: i64,
    pub standard: i64,
    pub premium: i64,
}

impl PriceTiers {
    pub fn cheapest(&self) -> i64 {
        self.economy.min(self.standard).min(self.premium)
    }
}

/// One scheduled screening, as served by the catalog.
///
/// Seat occupancy is not carried here; it lives behind the `SeatLedger`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub room_ref: String,
    pub starts_at: DateTime<Utc>,
    pub price_tiers: PriceTiers,
    pub language: String,
}

impl Show {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at
    }

    pub fn time_until_start(&self, now: DateTime<Utc>) -> Duration {
        self.starts_at - now
    }
}
