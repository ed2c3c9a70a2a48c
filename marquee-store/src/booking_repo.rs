use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::repository::BookingRepository;
use marquee_core::seat::to_strings;
use marquee_core::{Booking, BookingStatus, Cancellation, CoreError, CoreResult, SeatId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_sqlx_error;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = r#"
    id, user_ref, show_id, seat_ids, amount, currency, paid, status, payment_session_ref, paid_at,
    failure_reason, cancelled_at, cancellation_reason, refund_amount, refund_percentage, refund_status,
    created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_ref: String,
    show_id: Uuid,
    seat_ids: Vec<String>,
    amount: i64,
    currency: String,
    paid: bool,
    status: String,
    payment_session_ref: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    refund_amount: Option<i64>,
    refund_percentage: Option<i16>,
    refund_status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn corrupt(err: impl std::fmt::Display) -> CoreError {
    CoreError::StorageError(format!("corrupt booking row: {}", err))
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let seat_ids = row
            .seat_ids
            .iter()
            .map(|s| SeatId::parse(s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(corrupt)?;

        let cancellation = match (row.cancelled_at, row.refund_status) {
            (Some(cancelled_at), Some(refund_status)) => Some(Cancellation {
                cancelled_at,
                reason: row.cancellation_reason.unwrap_or_default(),
                refund_amount: row.refund_amount.unwrap_or(0),
                refund_percentage: row.refund_percentage.unwrap_or(0).clamp(0, 100) as u8,
                refund_status: refund_status.parse().map_err(corrupt)?,
            }),
            _ => None,
        };

        Ok(Booking::restore(
            row.id,
            row.user_ref,
            row.show_id,
            seat_ids,
            row.amount,
            row.currency,
            row.paid,
            row.status.parse().map_err(corrupt)?,
            row.payment_session_ref,
            row.paid_at,
            row.failure_reason.map(|r| r.parse()).transpose().map_err(corrupt)?,
            cancellation,
            row.created_at,
            row.updated_at,
        ))
    }
}

fn rows_to_bookings(rows: Vec<BookingRow>) -> CoreResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert(&self, booking: &Booking) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_ref, show_id, seat_ids, amount, currency, paid, status,
                                  payment_session_ref, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.user_ref)
        .bind(booking.show_id)
        .bind(to_strings(booking.seat_ids()))
        .bind(booking.amount)
        .bind(&booking.currency)
        .bind(booking.paid)
        .bind(booking.status.as_str())
        .bind(&booking.payment_session_ref)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_for_user(&self, user_ref: &str) -> CoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE user_ref = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_ref)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows_to_bookings(rows)
    }

    async fn list_stale_pending(&self, created_before: DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE status = 'pending' AND paid = FALSE AND created_at < $1",
            BOOKING_COLUMNS
        ))
        .bind(created_before)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows_to_bookings(rows)
    }

    async fn replace_if_status(&self, booking: &Booking, expected: BookingStatus) -> CoreResult<bool> {
        let cancellation = booking.cancellation.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                paid = $3, status = $4, payment_session_ref = $5, paid_at = $6, failure_reason = $7,
                cancelled_at = $8, cancellation_reason = $9, refund_amount = $10, refund_percentage = $11,
                refund_status = $12, updated_at = $13
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(booking.id)
        .bind(expected.as_str())
        .bind(booking.paid)
        .bind(booking.status.as_str())
        .bind(&booking.payment_session_ref)
        .bind(booking.paid_at)
        .bind(booking.failure_reason.map(|r| r.as_str()))
        .bind(cancellation.map(|c| c.cancelled_at))
        .bind(cancellation.map(|c| c.reason.clone()))
        .bind(cancellation.map(|c| c.refund_amount))
        .bind(cancellation.map(|c| i16::from(c.refund_percentage)))
        .bind(cancellation.map(|c| c.refund_status.as_str()))
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}
