use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::repository::ShowCatalog;
use marquee_core::{CoreResult, PriceTiers, Show};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_sqlx_error;

/// Read side of the `shows` table. Writes belong to the catalog service.
pub struct PgShowCatalog {
    pool: PgPool,
}

impl PgShowCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShowRow {
    id: Uuid,
    movie_id: Uuid,
    room_ref: String,
    starts_at: DateTime<Utc>,
    price_economy: i64,
    price_standard: i64,
    price_premium: i64,
    language: String,
}

impl From<ShowRow> for Show {
    fn from(row: ShowRow) -> Self {
        Show {
            id: row.id,
            movie_id: row.movie_id,
            room_ref: row.room_ref,
            starts_at: row.starts_at,
            price_tiers: PriceTiers {
                economy: row.price_economy,
                standard: row.price_standard,
                premium: row.price_premium,
            },
            language: row.language,
        }
    }
}

#[async_trait]
impl ShowCatalog for PgShowCatalog {
    async fn get_show(&self, show_id: Uuid) -> CoreResult<Option<Show>> {
        let row: Option<ShowRow> = sqlx::query_as(
            r#"
            SELECT id, movie_id, room_ref, starts_at, price_economy, price_standard, price_premium, language
            FROM shows WHERE id = $1
            "#,
        )
        .bind(show_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Show::from))
    }
}
