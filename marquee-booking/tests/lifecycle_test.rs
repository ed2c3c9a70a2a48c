use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marquee_booking::memory::{InMemoryBookingRepository, InMemoryEventLog, InMemorySeatLedger, InMemoryShowCatalog};
use marquee_booking::{
    BookingError, BookingManager, CheckoutSettings, Delivery, GatewayEvent, MockPaymentGateway, NewBooking,
    PaymentOrchestrator, Sweeper, TransitionOutcome, WebhookEnvelope, WebhookInbox,
};
use marquee_core::ledger::{ClaimOutcome, OccupiedSeat, SeatLedger};
use marquee_core::notify::LogNotifier;
use marquee_core::repository::{BookingRepository, ProcessedEventLog};
use marquee_core::{
    Booking, BookingRules, BookingStatus, CoreError, CoreResult, FailureReason, PriceTiers, RefundStatus, SeatId,
    Show,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    manager: Arc<BookingManager>,
    ledger: Arc<dyn SeatLedger>,
    gateway: Arc<MockPaymentGateway>,
    catalog: Arc<InMemoryShowCatalog>,
    show: Show,
}

fn show_starting_in(offset: Duration) -> Show {
    Show {
        id: Uuid::new_v4(),
        movie_id: Uuid::new_v4(),
        room_ref: "AUDI-1".to_string(),
        starts_at: Utc::now() + offset,
        price_tiers: PriceTiers { economy: 200, standard: 350, premium: 500 },
        language: "en".to_string(),
    }
}

async fn harness_with(
    show: Show,
    bookings: Arc<dyn BookingRepository>,
    ledger: Arc<dyn SeatLedger>,
    gateway: Arc<MockPaymentGateway>,
) -> Harness {
    harness_with_rules(show, bookings, ledger, gateway, BookingRules::default()).await
}

async fn harness_with_rules(
    show: Show,
    bookings: Arc<dyn BookingRepository>,
    ledger: Arc<dyn SeatLedger>,
    gateway: Arc<MockPaymentGateway>,
    rules: BookingRules,
) -> Harness {
    let catalog = Arc::new(InMemoryShowCatalog::new());
    catalog.insert(show.clone()).await;

    let payments = PaymentOrchestrator::new(gateway.clone(), CheckoutSettings::default());
    let manager = Arc::new(BookingManager::new(
        bookings,
        ledger.clone(),
        catalog.clone(),
        payments,
        Arc::new(LogNotifier),
        rules,
    ));
    Harness { manager, ledger, gateway, catalog, show }
}

async fn harness(show: Show) -> Harness {
    harness_with(
        show,
        Arc::new(InMemoryBookingRepository::new()),
        Arc::new(InMemorySeatLedger::new()),
        Arc::new(MockPaymentGateway::new()),
    )
    .await
}

fn request(show: &Show, user: &str, seats: &[&str], amount: i64) -> NewBooking {
    NewBooking {
        user_ref: user.to_string(),
        show_id: show.id,
        seat_ids: seats.iter().map(|s| s.to_string()).collect(),
        amount,
    }
}

#[tokio::test]
async fn test_booking_happy_path() {
    let h = harness(show_starting_in(Duration::hours(30))).await;

    let created = h.manager.create_booking(request(&h.show, "u1", &["A1", "A2"], 1000)).await.unwrap();
    assert!(created.redirect_url.starts_with("https://checkout.mock/"));

    let pending = h.manager.get_booking(created.booking_id, "u1").await.unwrap();
    assert_eq!(pending.status, BookingStatus::Pending);
    assert!(pending.hold_expires_at.is_some());
    assert_eq!(h.manager.occupied_seats(h.show.id).await.unwrap(), vec!["A1", "A2"]);

    let outcome = h
        .manager
        .handle_gateway_event(GatewayEvent::PaymentSucceeded { booking_id: created.booking_id })
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::Applied);

    let confirmed = h.manager.get_booking(created.booking_id, "u1").await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert!(confirmed.paid && confirmed.paid_at.is_some());
    assert!(confirmed.hold_expires_at.is_none());
    assert_eq!(h.manager.holds().scheduled_count().await, 0);

    // Duplicate delivery is a no-op
    let again = h.manager.confirm_payment(created.booking_id).await.unwrap();
    assert_eq!(again, TransitionOutcome::AlreadyApplied);
}

#[tokio::test]
async fn test_refund_tiers() {
    let cases = [
        (30, 800, RefundStatus::Processing),
        (18, 500, RefundStatus::Processing),
        (5, 250, RefundStatus::Processing),
        (1, 0, RefundStatus::Completed),
    ];

    for (hours, refund, status) in cases {
        let h = harness(show_starting_in(Duration::hours(hours))).await;
        let created = h.manager.create_booking(request(&h.show, "u1", &["B1"], 1000)).await.unwrap();
        h.manager.confirm_payment(created.booking_id).await.unwrap();

        let receipt = h.manager.cancel_booking(created.booking_id, "u1", "plans changed").await.unwrap();
        assert_eq!(receipt.refund_amount, refund, "{}h before start", hours);
        assert_eq!(receipt.refund_status, status);

        let view = h.manager.get_booking(created.booking_id, "u1").await.unwrap();
        assert_eq!(view.status, BookingStatus::Cancelled);
        assert!(view.paid);
        assert!(h.manager.occupied_seats(h.show.id).await.unwrap().is_empty());

        // Second cancel is rejected
        let err = h.manager.cancel_booking(created.booking_id, "u1", "again").await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition(_)));
    }
}

#[tokio::test]
async fn test_confirmation_is_sticky() {
    let h = harness(show_starting_in(Duration::hours(10))).await;
    let created = h.manager.create_booking(request(&h.show, "u1", &["C1"], 500)).await.unwrap();
    h.manager.confirm_payment(created.booking_id).await.unwrap();

    for event in [
        GatewayEvent::SessionExpired { booking_id: created.booking_id },
        GatewayEvent::PaymentFailed { booking_id: created.booking_id },
    ] {
        assert_eq!(h.manager.handle_gateway_event(event).await.unwrap(), TransitionOutcome::Ignored);
    }
    assert_eq!(h.manager.expire_hold(created.booking_id).await.unwrap(), TransitionOutcome::Ignored);

    let view = h.manager.get_booking(created.booking_id, "u1").await.unwrap();
    assert_eq!(view.status, BookingStatus::Confirmed);
    assert_eq!(h.manager.occupied_seats(h.show.id).await.unwrap(), vec!["C1"]);
}

#[tokio::test]
async fn test_late_confirmation_of_failed_booking_is_stale() {
    let h = harness(show_starting_in(Duration::hours(10))).await;
    let created = h.manager.create_booking(request(&h.show, "u1", &["C2"], 500)).await.unwrap();
    h.manager.fail_payment(created.booking_id, FailureReason::Declined).await.unwrap();

    let err = h.manager.confirm_payment(created.booking_id).await.unwrap_err();
    assert!(matches!(err, BookingError::StaleTransition { status: BookingStatus::PaymentFailed, .. }));

    // Through the webhook path the same event is acknowledged
    let outcome = h
        .manager
        .handle_gateway_event(GatewayEvent::PaymentSucceeded { booking_id: created.booking_id })
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::Ignored);
}

#[tokio::test]
async fn test_overlapping_claim_writes_nothing() {
    let h = harness(show_starting_in(Duration::hours(10))).await;
    h.manager.create_booking(request(&h.show, "u1", &["D1"], 500)).await.unwrap();

    let err = h.manager.create_booking(request(&h.show, "u2", &["D1", "D2"], 500)).await.unwrap_err();
    match err {
        BookingError::SeatsUnavailable(seats) => assert_eq!(seats, vec!["D1".to_string()]),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(h.manager.seats_available(h.show.id, &["D2".to_string()]).await.unwrap());
    assert!(h.manager.list_bookings("u2").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_have_one_winner() {
    let h = harness(show_starting_in(Duration::hours(10))).await;

    let mut tasks = Vec::new();
    for i in 0..16 {
        let manager = h.manager.clone();
        let req = request(&h.show, &format!("user-{}", i), &["E5", "E6"], 500);
        tasks.push(tokio::spawn(async move { manager.create_booking(req).await }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => winners += 1,
            Err(BookingError::SeatsUnavailable(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(h.manager.occupied_seats(h.show.id).await.unwrap(), vec!["E5", "E6"]);
}

#[tokio::test]
async fn test_sweeper_expires_holds_past_the_window() {
    let h = harness(show_starting_in(Duration::hours(10))).await;
    let created = h.manager.create_booking(request(&h.show, "u1", &["F1"], 500)).await.unwrap();
    // Simulate a lost in-process timer
    h.manager.holds().cancel_expiry(created.booking_id).await;

    let sweeper = Sweeper::new(h.manager.clone());
    let early = sweeper.run_once(Utc::now()).await;
    assert_eq!(early.examined, 0);

    let report = sweeper.run_once(Utc::now() + Duration::minutes(11)).await;
    assert_eq!(report.examined, 1);
    assert_eq!(report.expired, 1);

    let view = h.manager.get_booking(created.booking_id, "u1").await.unwrap();
    assert_eq!(view.status, BookingStatus::PaymentFailed);
    assert_eq!(view.failure_reason, Some(FailureReason::HoldExpired));
    assert!(h.manager.seats_available(h.show.id, &["F1".to_string()]).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_hold_timer_releases_seats() {
    let h = harness(show_starting_in(Duration::hours(10))).await;
    h.manager.spawn_expiry_listener().await.unwrap();
    assert!(h.manager.spawn_expiry_listener().await.is_none());

    let created = h.manager.create_booking(request(&h.show, "u1", &["G1"], 500)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(601)).await;

    // Let the listener run the transition
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    let view = h.manager.get_booking(created.booking_id, "u1").await.unwrap();
    assert_eq!(view.status, BookingStatus::PaymentFailed);
    assert!(h.manager.occupied_seats(h.show.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_gateway_outage_releases_seats() {
    let h = harness_with(
        show_starting_in(Duration::hours(10)),
        Arc::new(InMemoryBookingRepository::new()),
        Arc::new(InMemorySeatLedger::new()),
        Arc::new(MockPaymentGateway::unavailable()),
    )
    .await;

    let err = h.manager.create_booking(request(&h.show, "u1", &["H1"], 500)).await.unwrap_err();
    assert!(matches!(err, BookingError::PaymentUnavailable(_)));
    assert_eq!(h.gateway.requests().await.len(), 1);

    let bookings = h.manager.list_bookings("u1").await.unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].status, BookingStatus::PaymentFailed);
    assert_eq!(bookings[0].failure_reason, Some(FailureReason::CheckoutUnavailable));
    assert!(h.manager.occupied_seats(h.show.id).await.unwrap().is_empty());
}

/// Repository whose inserts always fail.
struct BrokenInserts(InMemoryBookingRepository);

#[async_trait]
impl BookingRepository for BrokenInserts {
    async fn insert(&self, _booking: &Booking) -> CoreResult<()> {
        Err(CoreError::StorageError("disk full".to_string()))
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        self.0.get(id).await
    }

    async fn list_for_user(&self, user_ref: &str) -> CoreResult<Vec<Booking>> {
        self.0.list_for_user(user_ref).await
    }

    async fn list_stale_pending(&self, created_before: DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        self.0.list_stale_pending(created_before).await
    }

    async fn replace_if_status(&self, booking: &Booking, expected: BookingStatus) -> CoreResult<bool> {
        self.0.replace_if_status(booking, expected).await
    }
}

#[tokio::test]
async fn test_failed_insert_releases_claim() {
    let h = harness_with(
        show_starting_in(Duration::hours(10)),
        Arc::new(BrokenInserts(InMemoryBookingRepository::new())),
        Arc::new(InMemorySeatLedger::new()),
        Arc::new(MockPaymentGateway::new()),
    )
    .await;

    let err = h.manager.create_booking(request(&h.show, "u1", &["J1", "J2"], 500)).await.unwrap_err();
    assert!(matches!(err, BookingError::Internal(_)));
    assert!(h.ledger.occupied(h.show.id).await.unwrap().is_empty());
    assert!(h.gateway.requests().await.is_empty());
}

/// Repository whose next status write fails once when armed.
struct FlakyWrites {
    inner: InMemoryBookingRepository,
    fail_next_write: AtomicBool,
}

#[async_trait]
impl BookingRepository for FlakyWrites {
    async fn insert(&self, booking: &Booking) -> CoreResult<()> {
        self.inner.insert(booking).await
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        self.inner.get(id).await
    }

    async fn list_for_user(&self, user_ref: &str) -> CoreResult<Vec<Booking>> {
        self.inner.list_for_user(user_ref).await
    }

    async fn list_stale_pending(&self, created_before: DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        self.inner.list_stale_pending(created_before).await
    }

    async fn replace_if_status(&self, booking: &Booking, expected: BookingStatus) -> CoreResult<bool> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(CoreError::StorageError("connection reset".to_string()));
        }
        self.inner.replace_if_status(booking, expected).await
    }
}

#[tokio::test]
async fn test_webhook_redelivery_after_failed_write_confirms() {
    let repo = Arc::new(FlakyWrites {
        inner: InMemoryBookingRepository::new(),
        fail_next_write: AtomicBool::new(false),
    });
    let h = harness_with(
        show_starting_in(Duration::hours(10)),
        repo.clone(),
        Arc::new(InMemorySeatLedger::new()),
        Arc::new(MockPaymentGateway::new()),
    )
    .await;
    let processed = Arc::new(InMemoryEventLog::new());
    let inbox = WebhookInbox::new(h.manager.clone(), Some(processed.clone()));

    let created = h.manager.create_booking(request(&h.show, "u1", &["Q1"], 500)).await.unwrap();
    let envelope = WebhookEnvelope {
        event_id: "evt_paid".to_string(),
        event: GatewayEvent::PaymentSucceeded { booking_id: created.booking_id },
    };

    // The confirmation write fails: the event must not be remembered
    repo.fail_next_write.store(true, Ordering::SeqCst);
    let err = inbox.deliver(envelope.clone()).await.unwrap_err();
    assert!(matches!(err, BookingError::Internal(_)));
    assert!(!processed.contains("evt_paid").await.unwrap());

    let delivery = inbox.deliver(envelope.clone()).await.unwrap();
    assert_eq!(delivery, Delivery::Dispatched(TransitionOutcome::Applied));
    assert!(processed.contains("evt_paid").await.unwrap());

    // The sweeper finds nothing to expire for a paid booking
    let report = Sweeper::new(h.manager.clone()).run_once(Utc::now() + Duration::hours(1)).await;
    assert_eq!(report.expired, 0);
    let view = h.manager.get_booking(created.booking_id, "u1").await.unwrap();
    assert_eq!(view.status, BookingStatus::Confirmed);

    assert_eq!(inbox.deliver(envelope).await.unwrap(), Delivery::Duplicate);
}

/// Ledger that reports write contention for the first few claims.
struct ContendedLedger {
    inner: InMemorySeatLedger,
    conflicts_left: AtomicU32,
}

#[async_trait]
impl SeatLedger for ContendedLedger {
    async fn claim(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<ClaimOutcome> {
        let left = self.conflicts_left.load(Ordering::SeqCst);
        if left > 0 {
            self.conflicts_left.store(left - 1, Ordering::SeqCst);
            return Err(CoreError::Conflict("serialization failure".to_string()));
        }
        self.inner.claim(show_id, seat_ids, holder).await
    }

    async fn release(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<()> {
        self.inner.release(show_id, seat_ids, holder).await
    }

    async fn mark_booked(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<()> {
        self.inner.mark_booked(show_id, seat_ids, holder).await
    }

    async fn is_free(&self, show_id: Uuid, seat_ids: &[SeatId]) -> CoreResult<bool> {
        self.inner.is_free(show_id, seat_ids).await
    }

    async fn occupied(&self, show_id: Uuid) -> CoreResult<Vec<OccupiedSeat>> {
        self.inner.occupied(show_id).await
    }
}

#[tokio::test]
async fn test_claim_conflicts_are_retried() {
    let ledger = Arc::new(ContendedLedger { inner: InMemorySeatLedger::new(), conflicts_left: AtomicU32::new(2) });
    let h = harness_with(
        show_starting_in(Duration::hours(10)),
        Arc::new(InMemoryBookingRepository::new()),
        ledger.clone(),
        Arc::new(MockPaymentGateway::new()),
    )
    .await;
    assert!(h.manager.create_booking(request(&h.show, "u1", &["K1"], 500)).await.is_ok());

    // More conflicts than the retry budget
    ledger.conflicts_left.store(10, Ordering::SeqCst);
    let err = h.manager.create_booking(request(&h.show, "u1", &["K2"], 500)).await.unwrap_err();
    assert!(matches!(err, BookingError::SeatsUnavailable(_)));
}

#[tokio::test]
async fn test_retry_payment() {
    let h = harness(show_starting_in(Duration::hours(10))).await;

    // Pending: a fresh session for the same booking
    let created = h.manager.create_booking(request(&h.show, "u1", &["L1"], 500)).await.unwrap();
    let retried = h.manager.retry_payment(created.booking_id, "u1").await.unwrap();
    assert_eq!(retried.booking_id, created.booking_id);
    assert_ne!(retried.redirect_url, created.redirect_url);

    // Failed: the seats are held again under a new booking
    h.manager.fail_payment(created.booking_id, FailureReason::Declined).await.unwrap();
    let rebooked = h.manager.retry_payment(created.booking_id, "u1").await.unwrap();
    assert_ne!(rebooked.booking_id, created.booking_id);
    assert_eq!(h.manager.occupied_seats(h.show.id).await.unwrap(), vec!["L1"]);

    let old = h.manager.get_booking(created.booking_id, "u1").await.unwrap();
    assert_eq!(old.status, BookingStatus::PaymentFailed);

    let err = h.manager.retry_payment(created.booking_id, "someone-else").await.unwrap_err();
    assert!(matches!(err, BookingError::NotOwner(_)));

    // Confirmed bookings cannot be retried
    h.manager.confirm_payment(rebooked.booking_id).await.unwrap();
    let err = h.manager.retry_payment(rebooked.booking_id, "u1").await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidTransition(_)));
}

#[tokio::test]
async fn test_retry_payment_after_window_is_rejected() {
    let h = harness_with_rules(
        show_starting_in(Duration::hours(10)),
        Arc::new(InMemoryBookingRepository::new()),
        Arc::new(InMemorySeatLedger::new()),
        Arc::new(MockPaymentGateway::new()),
        BookingRules { retry_window_seconds: 0, ..BookingRules::default() },
    )
    .await;

    let created = h.manager.create_booking(request(&h.show, "u1", &["L5"], 500)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let err = h.manager.retry_payment(created.booking_id, "u1").await.unwrap_err();
    assert!(matches!(err, BookingError::RetryWindowExpired));

    // A failed booking past the window does not get its seats back either
    h.manager.fail_payment(created.booking_id, FailureReason::Declined).await.unwrap();
    let err = h.manager.retry_payment(created.booking_id, "u1").await.unwrap_err();
    assert!(matches!(err, BookingError::RetryWindowExpired));
    assert!(h.manager.occupied_seats(h.show.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_guards() {
    let h = harness(show_starting_in(Duration::hours(10))).await;
    let created = h.manager.create_booking(request(&h.show, "u1", &["M1"], 500)).await.unwrap();

    // Unpaid bookings cannot be cancelled
    let err = h.manager.cancel_booking(created.booking_id, "u1", "x").await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidTransition(_)));

    h.manager.confirm_payment(created.booking_id).await.unwrap();
    let err = h.manager.cancel_booking(created.booking_id, "u2", "x").await.unwrap_err();
    assert!(matches!(err, BookingError::NotOwner(_)));

    let missing = h.manager.cancel_booking(Uuid::new_v4(), "u1", "x").await.unwrap_err();
    assert!(matches!(missing, BookingError::BookingNotFound(_)));
}

#[tokio::test]
async fn test_started_show_rejects_booking_and_cancel() {
    let started = harness(show_starting_in(Duration::minutes(-5))).await;
    let err = started.manager.create_booking(request(&started.show, "u1", &["N1"], 500)).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowStarted(_)));

    let h = harness(show_starting_in(Duration::hours(3))).await;
    let created = h.manager.create_booking(request(&h.show, "u1", &["N2"], 500)).await.unwrap();
    h.manager.confirm_payment(created.booking_id).await.unwrap();

    // The show gets moved earlier and is now running
    let mut moved = h.show.clone();
    moved.starts_at = Utc::now() - Duration::minutes(1);
    h.catalog.insert(moved).await;

    let err = h.manager.cancel_booking(created.booking_id, "u1", "too late").await.unwrap_err();
    assert!(matches!(err, BookingError::ShowStarted(_)));
    let view = h.manager.get_booking(created.booking_id, "u1").await.unwrap();
    assert_eq!(view.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_create_validation() {
    let h = harness(show_starting_in(Duration::hours(10))).await;

    let empty = h.manager.create_booking(request(&h.show, "u1", &[], 500)).await.unwrap_err();
    assert!(matches!(empty, BookingError::Validation(_)));

    let dup = h.manager.create_booking(request(&h.show, "u1", &["P1", "p1"], 500)).await.unwrap_err();
    assert!(matches!(dup, BookingError::Validation(_)));

    // Two seats at the cheapest tier cost 400
    let cheap = h.manager.create_booking(request(&h.show, "u1", &["P1", "P2"], 399)).await.unwrap_err();
    assert!(matches!(cheap, BookingError::Validation(_)));

    let huge = h
        .manager
        .create_booking(request(&h.show, "u1", &["P1"], 200_000_000_000_000_000))
        .await
        .unwrap_err();
    assert!(matches!(huge, BookingError::Validation(_)));
    assert!(h.manager.occupied_seats(h.show.id).await.unwrap().is_empty());

    let mut unknown = request(&h.show, "u1", &["P1"], 500);
    unknown.show_id = Uuid::new_v4();
    let err = h.manager.create_booking(unknown).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowNotFound(_)));
}
