use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::parse_id;
use crate::models::Offer;

#[derive(Debug, FromRow)]
struct OfferRow {
    id: String,
    code: String,
    discount_percent: f64,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = sqlx::Error;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        Ok(Offer {
            id: parse_id(&row.id)?,
            code: row.code,
            discount_percent: row.discount_percent,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            created_at: row.created_at,
        })
    }
}

pub async fn insert(db: &SqlitePool, offer: &Offer) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO offers (id, code, discount_percent, valid_from, valid_until, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(offer.id.to_string())
    .bind(&offer.code)
    .bind(offer.discount_percent)
    .bind(offer.valid_from)
    .bind(offer.valid_until)
    .bind(offer.created_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> Result<Option<Offer>, sqlx::Error> {
    sqlx::query_as::<_, OfferRow>(
        "SELECT id, code, discount_percent, valid_from, valid_until, created_at FROM offers WHERE id = ?1",
    )
    .bind(id.to_string())
    .fetch_optional(db)
    .await?
    .map(Offer::try_from)
    .transpose()
}
