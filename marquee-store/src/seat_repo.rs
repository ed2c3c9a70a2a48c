use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::ledger::{ClaimOutcome, OccupiedSeat, SeatLedger, SeatState};
use marquee_core::seat::to_strings;
use marquee_core::{CoreError, CoreResult, SeatId};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::database::map_sqlx_error;

/// Seat ledger backed by the `show_seats` table.
///
/// The `(show_id, seat_id)` primary key arbitrates claims: a claim inserts every
/// requested row in one transaction and commits only if all of them went in.
pub struct PgSeatLedger {
    pool: PgPool,
}

impl PgSeatLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    seat_id: String,
    holder: Uuid,
    state: String,
    claimed_at: DateTime<Utc>,
}

impl TryFrom<SeatRow> for OccupiedSeat {
    type Error = CoreError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        let state = match row.state.as_str() {
            "held" => SeatState::Held,
            "booked" => SeatState::Booked,
            other => return Err(CoreError::StorageError(format!("unknown seat state '{}'", other))),
        };
        Ok(OccupiedSeat {
            seat_id: SeatId::parse(&row.seat_id).map_err(|e| CoreError::StorageError(e.to_string()))?,
            holder: row.holder,
            state,
            claimed_at: row.claimed_at,
        })
    }
}

#[async_trait]
impl SeatLedger for PgSeatLedger {
    async fn claim(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<ClaimOutcome> {
        let labels = to_strings(seat_ids);
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Sorted insert order keeps concurrent overlapping claims from deadlocking
        let inserted = sqlx::query(
            r#"
            INSERT INTO show_seats (show_id, seat_id, holder, state)
            SELECT $1, s, $2, 'held' FROM UNNEST($3::text[]) AS s ORDER BY s
            ON CONFLICT (show_id, seat_id) DO NOTHING
            "#,
        )
        .bind(show_id)
        .bind(holder)
        .bind(&labels)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        if inserted == labels.len() as u64 {
            tx.commit().await.map_err(map_sqlx_error)?;
            return Ok(ClaimOutcome::Claimed);
        }
        tx.rollback().await.map_err(map_sqlx_error)?;

        let taken: Vec<String> = sqlx::query_scalar(
            "SELECT seat_id FROM show_seats WHERE show_id = $1 AND seat_id = ANY($2) ORDER BY seat_id",
        )
        .bind(show_id)
        .bind(&labels)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if taken.is_empty() {
            // The blocking holder released in between; let the caller retry
            return Err(CoreError::Conflict(format!("seat claim on show {} raced a release", show_id)));
        }
        debug!(show_id = %show_id, "claim lost on {} seat(s)", taken.len());

        let taken = taken
            .iter()
            .map(|s| SeatId::parse(s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::StorageError(e.to_string()))?;
        Ok(ClaimOutcome::Unavailable(taken))
    }

    async fn release(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM show_seats WHERE show_id = $1 AND holder = $2 AND seat_id = ANY($3)")
            .bind(show_id)
            .bind(holder)
            .bind(to_strings(seat_ids))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn mark_booked(&self, show_id: Uuid, seat_ids: &[SeatId], holder: Uuid) -> CoreResult<()> {
        sqlx::query(
            "UPDATE show_seats SET state = 'booked' WHERE show_id = $1 AND holder = $2 AND seat_id = ANY($3)",
        )
        .bind(show_id)
        .bind(holder)
        .bind(to_strings(seat_ids))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn is_free(&self, show_id: Uuid, seat_ids: &[SeatId]) -> CoreResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM show_seats WHERE show_id = $1 AND seat_id = ANY($2)")
                .bind(show_id)
                .bind(to_strings(seat_ids))
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(count == 0)
    }

    async fn occupied(&self, show_id: Uuid) -> CoreResult<Vec<OccupiedSeat>> {
        let rows: Vec<SeatRow> =
            sqlx::query_as("SELECT seat_id, holder, state, claimed_at FROM show_seats WHERE show_id = $1")
                .bind(show_id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        rows.into_iter().map(OccupiedSeat::try_from).collect()
    }
}
