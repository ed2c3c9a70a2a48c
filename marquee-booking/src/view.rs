use chrono::{DateTime, Duration, Utc};
use marquee_core::seat::{sort_natural, to_strings};
use marquee_core::{Booking, BookingStatus, FailureReason, RefundStatus, Show};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct CancellationView {
    pub cancelled_at: DateTime<Utc>,
    pub reason: String,
    pub refund_amount: i64,
    pub refund_display: String,
    pub refund_percentage: u8,
    pub refund_status: RefundStatus,
}

/// What a customer sees for one of their bookings.
#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    pub booking_id: Uuid,
    pub show_id: Uuid,
    pub show_starts_at: Option<DateTime<Utc>>,
    pub room_ref: Option<String>,
    pub language: Option<String>,
    pub seat_ids: Vec<String>,
    pub seat_count: usize,
    pub amount: i64,
    pub amount_display: String,
    pub currency: String,
    pub status: BookingStatus,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<FailureReason>,
    pub cancellation: Option<CancellationView>,
    pub created_at: DateTime<Utc>,
}

impl BookingView {
    /// `show` may be missing if the catalog no longer serves it; the booking
    /// still renders without schedule details.
    pub fn build(booking: &Booking, show: Option<&Show>, hold: Duration) -> Self {
        let mut seats = booking.seat_ids().to_vec();
        sort_natural(&mut seats);

        let hold_expires_at = (booking.status == BookingStatus::Pending).then(|| booking.created_at + hold);

        Self {
            booking_id: booking.id,
            show_id: booking.show_id,
            show_starts_at: show.map(|s| s.starts_at),
            room_ref: show.map(|s| s.room_ref.clone()),
            language: show.map(|s| s.language.clone()),
            seat_count: seats.len(),
            seat_ids: to_strings(&seats),
            amount: booking.amount,
            amount_display: format_amount(booking.amount, &booking.currency),
            currency: booking.currency.clone(),
            status: booking.status,
            paid: booking.paid,
            paid_at: booking.paid_at,
            hold_expires_at,
            failure_reason: booking.failure_reason,
            cancellation: booking.cancellation.as_ref().map(|c| CancellationView {
                cancelled_at: c.cancelled_at,
                reason: c.reason.clone(),
                refund_amount: c.refund_amount,
                refund_display: format_amount(c.refund_amount, &booking.currency),
                refund_percentage: c.refund_percentage,
                refund_status: c.refund_status,
            }),
            created_at: booking.created_at,
        }
    }
}

/// `1000, "INR"` → `"INR 1,000.00"`
pub fn format_amount(amount: i64, currency: &str) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{} {}{}.00", currency.to_uppercase(), sign, grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::seat::parse_seat_list;
    use marquee_core::PriceTiers;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0, "inr"), "INR 0.00");
        assert_eq!(format_amount(999, "INR"), "INR 999.00");
        assert_eq!(format_amount(1000, "INR"), "INR 1,000.00");
        assert_eq!(format_amount(1234567, "USD"), "USD 1,234,567.00");
    }

    #[test]
    fn test_view_orders_seats_and_shows_hold() {
        let now = Utc::now();
        let show = Show {
            id: Uuid::new_v4(),
            movie_id: Uuid::new_v4(),
            room_ref: "AUDI-2".to_string(),
            starts_at: now + Duration::hours(5),
            price_tiers: PriceTiers { economy: 150, standard: 250, premium: 400 },
            language: "hi".to_string(),
        };
        let booking = Booking::new_pending(
            Uuid::new_v4(),
            "user-1".to_string(),
            show.id,
            parse_seat_list(&["B10", "B2"]).unwrap(),
            500,
            "INR".to_string(),
            now,
        );

        let view = BookingView::build(&booking, Some(&show), Duration::minutes(10));
        assert_eq!(view.seat_ids, vec!["B2", "B10"]);
        assert_eq!(view.hold_expires_at, Some(now + Duration::minutes(10)));
        assert_eq!(view.room_ref.as_deref(), Some("AUDI-2"));
        assert_eq!(view.amount_display, "INR 500.00");
    }
}
