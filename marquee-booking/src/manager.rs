use chrono::{DateTime, Utc};
use marquee_core::ledger::{ClaimOutcome, SeatLedger};
use marquee_core::notify::Notifier;
use marquee_core::payment::CheckoutSession;
use marquee_core::repository::{BookingRepository, ShowCatalog};
use marquee_core::seat::{parse_seat_list, sort_natural, to_strings};
use marquee_core::{
    Booking, BookingRules, BookingStatus, Cancellation, CoreError, FailureReason, RefundStatus, SeatId, Show,
    TransitionError,
};
use marquee_shared::models::events::{
    BookingCancelledEvent, BookingConfirmedEvent, PaymentFailedEvent, SeatChange, SeatsChangedEvent,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::hold::HoldManager;
use crate::orchestrator::PaymentOrchestrator;
use crate::refund;
use crate::view::BookingView;
use crate::webhook::GatewayEvent;

/// Re-reads allowed when a compare-and-set loses to a concurrent writer.
const CAS_ATTEMPTS: usize = 3;
const SEAT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_ref: String,
    pub show_id: Uuid,
    pub seat_ids: Vec<String>,
    /// Tier-derived total supplied by the caller, in whole currency units.
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedBooking {
    pub booking_id: Uuid,
    pub redirect_url: String,
    pub hold_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationReceipt {
    pub refund_amount: i64,
    pub refund_percentage: u8,
    pub refund_status: RefundStatus,
}

/// Result of a gateway- or timer-driven transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// The booking was already in the requested state.
    AlreadyApplied,
    /// The event no longer applies (e.g. a failure after confirmation).
    Ignored,
}

/// Owns the booking lifecycle and is the only writer of seat occupancy.
pub struct BookingManager {
    bookings: Arc<dyn BookingRepository>,
    ledger: Arc<dyn SeatLedger>,
    catalog: Arc<dyn ShowCatalog>,
    payments: PaymentOrchestrator,
    notifier: Arc<dyn Notifier>,
    holds: HoldManager,
    expired_rx: Mutex<Option<mpsc::UnboundedReceiver<Uuid>>>,
    seat_events: broadcast::Sender<SeatsChangedEvent>,
    rules: BookingRules,
}

impl BookingManager {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        ledger: Arc<dyn SeatLedger>,
        catalog: Arc<dyn ShowCatalog>,
        payments: PaymentOrchestrator,
        notifier: Arc<dyn Notifier>,
        rules: BookingRules,
    ) -> Self {
        let (holds, expired_rx) = HoldManager::new();
        let (seat_events, _) = broadcast::channel(SEAT_EVENT_CAPACITY);
        Self {
            bookings,
            ledger,
            catalog,
            payments,
            notifier,
            holds,
            expired_rx: Mutex::new(Some(expired_rx)),
            seat_events,
            rules,
        }
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    pub fn holds(&self) -> &HoldManager {
        &self.holds
    }

    pub fn subscribe_seat_changes(&self) -> broadcast::Receiver<SeatsChangedEvent> {
        self.seat_events.subscribe()
    }

    /// Starts consuming hold-timer expiries. Only the first call spawns anything.
    pub async fn spawn_expiry_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut rx = self.expired_rx.lock().await.take()?;
        let manager = Arc::clone(self);
        Some(tokio::spawn(async move {
            while let Some(booking_id) = rx.recv().await {
                if let Err(e) = manager.expire_hold(booking_id).await {
                    error!(booking_id = %booking_id, "hold expiry failed: {}", e);
                }
            }
        }))
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Claim seats, persist a pending booking, start the hold clock and open a
    /// checkout session.
    pub async fn create_booking(&self, req: NewBooking) -> BookingResult<CreatedBooking> {
        let seats = parse_seat_list(&req.seat_ids)?;
        if req.amount < self.rules.min_amount {
            return Err(BookingError::Validation(format!(
                "amount must be at least {}",
                self.rules.min_amount
            )));
        }
        if req.amount > self.rules.max_amount {
            return Err(BookingError::Validation(format!(
                "amount must be at most {}",
                self.rules.max_amount
            )));
        }

        let now = Utc::now();
        let show = self.load_show(req.show_id).await?;
        if show.has_started(now) {
            return Err(BookingError::ShowStarted(show.id));
        }

        let floor = show.price_tiers.cheapest().saturating_mul(seats.len() as i64);
        if req.amount < floor {
            return Err(BookingError::Validation(format!(
                "amount {} is below the lowest fare {} for {} seat(s)",
                req.amount,
                floor,
                seats.len()
            )));
        }

        self.open_hold(req.user_ref, &show, seats, req.amount, now).await
    }

    async fn open_hold(
        &self,
        user_ref: String,
        show: &Show,
        seats: Vec<SeatId>,
        amount: i64,
        now: DateTime<Utc>,
    ) -> BookingResult<CreatedBooking> {
        let booking_id = Uuid::new_v4();
        self.claim_seats(show.id, &seats, booking_id).await?;

        let booking = Booking::new_pending(
            booking_id,
            user_ref,
            show.id,
            seats,
            amount,
            self.rules.currency.clone(),
            now,
        );

        if let Err(e) = self.bookings.insert(&booking).await {
            // The claim must not outlive a booking that was never written
            error!(booking_id = %booking_id, "failed to persist booking, releasing claim: {}", e);
            self.release_seats(show.id, booking.seat_ids(), booking_id).await;
            return Err(BookingError::Internal(format!("could not record booking: {}", e)));
        }

        let hold = self.rules.hold_duration();
        self.holds.schedule_expiry(booking_id, hold).await;
        info!(booking_id = %booking_id, show_id = %show.id, seats = booking.seat_ids().len(), "hold opened");

        let session = self.start_checkout(booking).await?;
        Ok(CreatedBooking {
            booking_id,
            redirect_url: session.redirect_url,
            hold_expires_at: now + chrono_duration(hold),
        })
    }

    async fn claim_seats(&self, show_id: Uuid, seats: &[SeatId], holder: Uuid) -> BookingResult<()> {
        let mut attempt: u32 = 0;
        loop {
            match self.ledger.claim(show_id, seats, holder).await {
                Ok(ClaimOutcome::Claimed) => {
                    self.publish_seats(show_id, seats, SeatChange::Claimed);
                    return Ok(());
                }
                Ok(ClaimOutcome::Unavailable(taken)) => {
                    debug!(show_id = %show_id, "claim rejected, seats taken: {:?}", taken);
                    return Err(BookingError::SeatsUnavailable(to_strings(&taken)));
                }
                Err(CoreError::Conflict(msg)) if attempt < self.rules.claim_retries => {
                    attempt += 1;
                    debug!(show_id = %show_id, attempt, "seat claim conflict, retrying: {}", msg);
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                Err(CoreError::Conflict(msg)) => {
                    warn!(show_id = %show_id, "seat claim kept conflicting, giving up: {}", msg);
                    return Err(BookingError::SeatsUnavailable(to_strings(seats)));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Ask the gateway for a session. Any failure fails the booking so the seats
    /// go back on sale straight away.
    async fn start_checkout(&self, mut booking: Booking) -> BookingResult<CheckoutSession> {
        let opened = self
            .payments
            .open_checkout(booking.id, booking.amount, &booking.currency, Utc::now())
            .await;

        let session = match opened {
            Ok(session) => session,
            Err(e) => {
                warn!(booking_id = %booking.id, "checkout could not be opened: {}", e);
                if let Err(fail_err) = self.fail_payment(booking.id, FailureReason::CheckoutUnavailable).await {
                    error!(booking_id = %booking.id, "could not fail booking after checkout error: {}", fail_err);
                }
                return Err(BookingError::PaymentUnavailable(e.to_string()));
            }
        };

        booking.attach_session(session.session_ref.clone(), Utc::now());
        if !self.bookings.replace_if_status(&booking, BookingStatus::Pending).await? {
            let current = self.load(booking.id).await?;
            if current.status != BookingStatus::Confirmed {
                return Err(BookingError::StaleTransition {
                    booking_id: booking.id,
                    status: current.status,
                });
            }
        }
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Payment transitions
    // ------------------------------------------------------------------

    /// pending → confirmed. A repeat on a confirmed booking is a no-op success.
    pub async fn confirm_payment(&self, booking_id: Uuid) -> BookingResult<TransitionOutcome> {
        for _ in 0..CAS_ATTEMPTS {
            let mut booking = self.load(booking_id).await?;
            match booking.status {
                BookingStatus::Confirmed => return Ok(TransitionOutcome::AlreadyApplied),
                BookingStatus::Pending => {
                    booking.confirm(Utc::now())?;
                    if !self.bookings.replace_if_status(&booking, BookingStatus::Pending).await? {
                        continue;
                    }

                    self.holds.cancel_expiry(booking_id).await;
                    if let Err(e) = self.ledger.mark_booked(booking.show_id, booking.seat_ids(), booking_id).await {
                        warn!(booking_id = %booking_id, "could not mark seats booked: {}", e);
                    }
                    self.publish_seats(booking.show_id, booking.seat_ids(), SeatChange::Booked);
                    self.notify_confirmed(&booking);
                    info!(booking_id = %booking_id, "payment confirmed");
                    return Ok(TransitionOutcome::Applied);
                }
                status => {
                    if status == BookingStatus::PaymentFailed {
                        warn!(booking_id = %booking_id, "payment captured for a failed booking, refund needed");
                    } else {
                        info!(booking_id = %booking_id, status = %status, "stale payment confirmation");
                    }
                    return Err(BookingError::StaleTransition { booking_id, status });
                }
            }
        }
        Err(BookingError::Internal(format!("booking {} kept changing during confirmation", booking_id)))
    }

    /// pending → payment_failed, releasing the hold. Never downgrades a
    /// confirmed booking. Repeats re-run the (idempotent) release.
    pub async fn fail_payment(&self, booking_id: Uuid, reason: FailureReason) -> BookingResult<TransitionOutcome> {
        for _ in 0..CAS_ATTEMPTS {
            let mut booking = self.load(booking_id).await?;
            match booking.status {
                BookingStatus::Pending => {
                    booking.fail(reason, Utc::now())?;
                    if !self.bookings.replace_if_status(&booking, BookingStatus::Pending).await? {
                        continue;
                    }

                    self.holds.cancel_expiry(booking_id).await;
                    self.release_seats(booking.show_id, booking.seat_ids(), booking_id).await;
                    self.notify_failed(&booking, reason);
                    info!(booking_id = %booking_id, reason = reason.as_str(), "payment failed, hold released");
                    return Ok(TransitionOutcome::Applied);
                }
                BookingStatus::PaymentFailed => {
                    self.release_seats(booking.show_id, booking.seat_ids(), booking_id).await;
                    return Ok(TransitionOutcome::AlreadyApplied);
                }
                status => {
                    info!(booking_id = %booking_id, status = %status, "ignoring failure for settled booking");
                    return Ok(TransitionOutcome::Ignored);
                }
            }
        }
        Err(BookingError::Internal(format!("booking {} kept changing during failure", booking_id)))
    }

    /// Called by hold timers and the sweeper.
    pub async fn expire_hold(&self, booking_id: Uuid) -> BookingResult<TransitionOutcome> {
        self.fail_payment(booking_id, FailureReason::HoldExpired).await
    }

    /// Apply an authenticated gateway event. Stale and unknown events come back
    /// as `Ignored` so the webhook can acknowledge them.
    pub async fn handle_gateway_event(&self, event: GatewayEvent) -> BookingResult<TransitionOutcome> {
        let result = match event {
            GatewayEvent::PaymentSucceeded { booking_id } => self.confirm_payment(booking_id).await,
            GatewayEvent::SessionExpired { booking_id } => {
                self.fail_payment(booking_id, FailureReason::SessionExpired).await
            }
            GatewayEvent::PaymentFailed { booking_id } => self.fail_payment(booking_id, FailureReason::Declined).await,
            GatewayEvent::Ignored { event_type } => {
                debug!(event_type = %event_type, "ignoring gateway event");
                return Ok(TransitionOutcome::Ignored);
            }
        };

        match result {
            Err(BookingError::StaleTransition { .. }) => Ok(TransitionOutcome::Ignored),
            Err(BookingError::BookingNotFound(id)) => {
                warn!(booking_id = %id, "gateway event for unknown booking");
                Ok(TransitionOutcome::Ignored)
            }
            other => other,
        }
    }

    /// Open a new checkout for an unpaid booking, within the retry window.
    ///
    /// A pending booking gets a fresh session. A failed booking stays failed; its
    /// seats are claimed again into a brand new pending booking.
    pub async fn retry_payment(&self, booking_id: Uuid, user_ref: &str) -> BookingResult<CreatedBooking> {
        let booking = self.load(booking_id).await?;
        if !booking.is_owned_by(user_ref) {
            return Err(BookingError::NotOwner(booking_id));
        }

        let now = Utc::now();
        if now - booking.created_at > self.rules.retry_window() {
            return Err(BookingError::RetryWindowExpired);
        }

        match booking.status {
            BookingStatus::Pending => {
                let hold_expires_at = booking.created_at + chrono_duration(self.rules.hold_duration());
                let session = self.start_checkout(booking).await?;
                Ok(CreatedBooking {
                    booking_id,
                    redirect_url: session.redirect_url,
                    hold_expires_at,
                })
            }
            BookingStatus::PaymentFailed => {
                let show = self.load_show(booking.show_id).await?;
                if show.has_started(now) {
                    return Err(BookingError::ShowStarted(show.id));
                }
                info!(booking_id = %booking_id, "re-holding seats of failed booking");
                self.open_hold(booking.user_ref.clone(), &show, booking.seat_ids().to_vec(), booking.amount, now)
                    .await
            }
            status => Err(TransitionError { from: status, to: BookingStatus::Pending }.into()),
        }
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    /// confirmed → cancelled with a time-tiered refund. The state change is the
    /// commitment; seat release afterwards is best effort.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        user_ref: &str,
        reason: &str,
    ) -> BookingResult<CancellationReceipt> {
        let mut booking = self.load(booking_id).await?;
        if !booking.is_owned_by(user_ref) {
            return Err(BookingError::NotOwner(booking_id));
        }
        if booking.is_cancelled() || !booking.paid {
            return Err(TransitionError { from: booking.status, to: BookingStatus::Cancelled }.into());
        }

        let show = self.load_show(booking.show_id).await?;
        let now = Utc::now();
        if show.has_started(now) {
            return Err(BookingError::ShowStarted(show.id));
        }

        let quote = refund::quote(booking.amount, show.time_until_start(now));
        booking.cancel(Cancellation {
            cancelled_at: now,
            reason: reason.to_string(),
            refund_amount: quote.amount,
            refund_percentage: quote.percentage,
            refund_status: quote.status,
        })?;

        if !self.bookings.replace_if_status(&booking, BookingStatus::Confirmed).await? {
            let current = self.load(booking_id).await?;
            return Err(TransitionError { from: current.status, to: BookingStatus::Cancelled }.into());
        }
        info!(
            booking_id = %booking_id,
            refund = quote.amount,
            percentage = quote.percentage,
            "booking cancelled"
        );

        self.release_seats(booking.show_id, booking.seat_ids(), booking_id).await;
        self.notify_cancelled(&booking);

        Ok(CancellationReceipt {
            refund_amount: quote.amount,
            refund_percentage: quote.percentage,
            refund_status: quote.status,
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn get_booking(&self, booking_id: Uuid, user_ref: &str) -> BookingResult<BookingView> {
        let booking = self.load(booking_id).await?;
        if !booking.is_owned_by(user_ref) {
            return Err(BookingError::NotOwner(booking_id));
        }
        let show = self.catalog.get_show(booking.show_id).await?;
        Ok(BookingView::build(&booking, show.as_ref(), self.hold_window()))
    }

    pub async fn list_bookings(&self, user_ref: &str) -> BookingResult<Vec<BookingView>> {
        let bookings = self.bookings.list_for_user(user_ref).await?;

        let mut shows: HashMap<Uuid, Option<Show>> = HashMap::new();
        let mut views = Vec::with_capacity(bookings.len());
        for booking in &bookings {
            if !shows.contains_key(&booking.show_id) {
                let show = self.catalog.get_show(booking.show_id).await?;
                shows.insert(booking.show_id, show);
            }
            let show = shows.get(&booking.show_id).and_then(|s| s.as_ref());
            views.push(BookingView::build(booking, show, self.hold_window()));
        }
        Ok(views)
    }

    /// Seat ids currently held or booked, in natural order.
    pub async fn occupied_seats(&self, show_id: Uuid) -> BookingResult<Vec<String>> {
        self.load_show(show_id).await?;
        let mut seats: Vec<SeatId> = self.ledger.occupied(show_id).await?.into_iter().map(|s| s.seat_id).collect();
        sort_natural(&mut seats);
        Ok(to_strings(&seats))
    }

    /// Pre-flight availability check for seat pickers.
    pub async fn seats_available(&self, show_id: Uuid, seat_ids: &[String]) -> BookingResult<bool> {
        let seats = parse_seat_list(seat_ids)?;
        self.load_show(show_id).await?;
        Ok(self.ledger.is_free(show_id, &seats).await?)
    }

    /// Pending, unpaid bookings whose hold ran out before `now`.
    pub async fn stale_holds(&self, now: DateTime<Utc>) -> BookingResult<Vec<Uuid>> {
        let cutoff = now - self.hold_window();
        Ok(self.bookings.list_stale_pending(cutoff).await?.into_iter().map(|b| b.id).collect())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn load(&self, booking_id: Uuid) -> BookingResult<Booking> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    async fn load_show(&self, show_id: Uuid) -> BookingResult<Show> {
        self.catalog.get_show(show_id).await?.ok_or(BookingError::ShowNotFound(show_id))
    }

    fn hold_window(&self) -> chrono::Duration {
        chrono_duration(self.rules.hold_duration())
    }

    /// Release failures are logged only; a repeat `fail_payment` retries them.
    async fn release_seats(&self, show_id: Uuid, seats: &[SeatId], holder: Uuid) {
        match self.ledger.release(show_id, seats, holder).await {
            Ok(()) => self.publish_seats(show_id, seats, SeatChange::Released),
            Err(e) => error!(booking_id = %holder, show_id = %show_id, "seat release failed: {}", e),
        }
    }

    fn publish_seats(&self, show_id: Uuid, seats: &[SeatId], change: SeatChange) {
        // No subscribers is fine
        let _ = self.seat_events.send(SeatsChangedEvent {
            show_id,
            seat_ids: to_strings(seats),
            change,
            timestamp: Utc::now().timestamp(),
        });
    }

    fn notify_confirmed(&self, booking: &Booking) {
        let notifier = self.notifier.clone();
        let event = BookingConfirmedEvent {
            booking_id: booking.id,
            user_ref: booking.user_ref.clone(),
            show_id: booking.show_id,
            seat_ids: to_strings(booking.seat_ids()),
            amount: booking.amount,
            currency: booking.currency.clone(),
            paid_at: booking.paid_at.unwrap_or_else(Utc::now),
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.booking_confirmed(event).await {
                warn!("booking confirmation notification failed: {}", e);
            }
        });
    }

    fn notify_cancelled(&self, booking: &Booking) {
        let Some(cancellation) = booking.cancellation.clone() else { return };
        let notifier = self.notifier.clone();
        let event = BookingCancelledEvent {
            booking_id: booking.id,
            user_ref: booking.user_ref.clone(),
            show_id: booking.show_id,
            refund_amount: cancellation.refund_amount,
            refund_percentage: cancellation.refund_percentage,
            refund_status: cancellation.refund_status.as_str().to_string(),
            cancelled_at: cancellation.cancelled_at,
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.booking_cancelled(event).await {
                warn!("cancellation notification failed: {}", e);
            }
        });
    }

    fn notify_failed(&self, booking: &Booking, reason: FailureReason) {
        let notifier = self.notifier.clone();
        let event = PaymentFailedEvent {
            booking_id: booking.id,
            user_ref: booking.user_ref.clone(),
            show_id: booking.show_id,
            reason: reason.as_str().to_string(),
            timestamp: Utc::now().timestamp(),
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.payment_failed(event).await {
                warn!("payment failure notification failed: {}", e);
            }
        });
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::seconds(d.as_secs() as i64))
}
