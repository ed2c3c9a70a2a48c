//! In-process adapters for the collaborator ports.
//!
//! Used by tests and local runs; production wiring uses the Postgres store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::ledger::{ClaimOutcome, OccupiedSeat, SeatLedger, SeatState};
use marquee_core::repository::{BookingRepository, ProcessedEventLog, ShowCatalog};
use marquee_core::{Booking, BookingStatus, CoreError, CoreResult, SeatId, Show};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

type SeatMap = HashMap<SeatId, OccupiedSeat>;

/// Seat ledger with one lock per show: the whole occupied-seats map of a show is
/// checked and written under that lock, so a claim is a single compare-and-set.
#[derive(Default)]
pub struct InMemorySeatLedger {
    shows: RwLock<HashMap<Uuid, Arc<Mutex<SeatMap>>>>,
}

impl InMemorySeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn show_map(&self, show_id: Uuid) -> Arc<Mutex<SeatMap>> {
        if let Some(map) = self.shows.read().await.get(&show_id) {
            return map.clone();
        }
        self.shows.write().await.entry(show_id).or_default().clone()
    }
}

#[async_trait]
impl SeatLedger for InMemorySeatLedger {
    async fn claim(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<ClaimOutcome> {
        let map = self.show_map(show_id).await;
        let mut occupied = map.lock().await;

        let taken: Vec<SeatId> = seat_ids
            .iter()
            .filter(|seat| occupied.contains_key(*seat))
            .cloned()
            .collect();
        if !taken.is_empty() {
            return Ok(ClaimOutcome::Unavailable(taken));
        }

        let now = Utc::now();
        for seat in seat_ids {
            occupied.insert(
                seat.clone(),
                OccupiedSeat {
                    seat_id: seat.clone(),
                    holder,
                    state: SeatState::Held,
                    claimed_at: now,
                },
            );
        }
        Ok(ClaimOutcome::Claimed)
    }

    async fn release(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<()> {
        let map = self.show_map(show_id).await;
        let mut occupied = map.lock().await;
        for seat in seat_ids {
            if occupied.get(seat).map(|entry| entry.holder) == Some(holder) {
                occupied.remove(seat);
            }
        }
        Ok(())
    }

    async fn mark_booked(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<()> {
        let map = self.show_map(show_id).await;
        let mut occupied = map.lock().await;
        for seat in seat_ids {
            if let Some(entry) = occupied.get_mut(seat) {
                if entry.holder == holder {
                    entry.state = SeatState::Booked;
                }
            }
        }
        Ok(())
    }

    async fn is_free(&self, show_id: Uuid, seat_ids: &[SeatId]) -> CoreResult<bool> {
        let map = self.show_map(show_id).await;
        let occupied = map.lock().await;
        Ok(seat_ids.iter().all(|seat| !occupied.contains_key(seat)))
    }

    async fn occupied(&self, show_id: Uuid) -> CoreResult<Vec<OccupiedSeat>> {
        let map = self.show_map(show_id).await;
        let occupied = map.lock().await;
        Ok(occupied.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: &Booking) -> CoreResult<()> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(CoreError::Conflict(format!("booking {} already exists", booking.id)));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn list_for_user(&self, user_ref: &str) -> CoreResult<Vec<Booking>> {
        let mut found: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.user_ref == user_ref)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_stale_pending(&self, created_before: DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.status == BookingStatus::Pending && !b.paid && b.created_at < created_before)
            .cloned()
            .collect())
    }

    async fn replace_if_status(&self, booking: &Booking, expected: BookingStatus) -> CoreResult<bool> {
        let mut bookings = self.bookings.write().await;
        match bookings.get_mut(&booking.id) {
            Some(stored) if stored.status == expected => {
                *stored = booking.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(CoreError::NotFound(format!("booking {}", booking.id))),
        }
    }
}

#[derive(Default)]
pub struct InMemoryShowCatalog {
    shows: RwLock<HashMap<Uuid, Show>>,
}

impl InMemoryShowCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, show: Show) {
        self.shows.write().await.insert(show.id, show);
    }
}

#[async_trait]
impl ShowCatalog for InMemoryShowCatalog {
    async fn get_show(&self, show_id: Uuid) -> CoreResult<Option<Show>> {
        Ok(self.shows.read().await.get(&show_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryEventLog {
    ids: RwLock<HashSet<String>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessedEventLog for InMemoryEventLog {
    async fn contains(&self, event_id: &str) -> CoreResult<bool> {
        Ok(self.ids.read().await.contains(event_id))
    }

    async fn record(&self, event_id: &str) -> CoreResult<()> {
        self.ids.write().await.insert(event_id.to_string());
        Ok(())
    }
}
