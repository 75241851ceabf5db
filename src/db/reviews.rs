//! Product reviews.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use super::PageParams;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub buyer_id: Uuid,
    pub rating: i32,
    pub title: Option<String>,
    pub body: Option<String>,
    pub verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review with the reviewer's display name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    pub reviewer_name: String,
}

pub struct ReviewFields<'a> {
    pub rating: i32,
    pub title: Option<&'a str>,
    pub body: Option<&'a str>,
}

pub async fn insert(
    db: impl PgExecutor<'_>,
    product_id: Uuid,
    buyer_id: Uuid,
    fields: &ReviewFields<'_>,
    verified_purchase: bool,
) -> Result<Review, sqlx::Error> {
    sqlx::query_as::<_, Review>(
        "INSERT INTO reviews (id, product_id, buyer_id, rating, title, body, verified_purchase)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(product_id)
    .bind(buyer_id)
    .bind(fields.rating)
    .bind(fields.title)
    .bind(fields.body)
    .bind(verified_purchase)
    .fetch_one(db)
    .await
}

pub async fn find(db: impl PgExecutor<'_>, id: Uuid) -> Result<Option<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1").bind(id).fetch_optional(db).await
}

pub async fn update(db: impl PgExecutor<'_>, id: Uuid, buyer_id: Uuid, fields: &ReviewFields<'_>) -> Result<Option<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>(
        "UPDATE reviews SET rating = $3, title = $4, body = $5, updated_at = NOW()
         WHERE id = $1 AND buyer_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(buyer_id)
    .bind(fields.rating)
    .bind(fields.title)
    .bind(fields.body)
    .fetch_optional(db)
    .await
}

pub async fn delete(db: impl PgExecutor<'_>, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = $1").bind(id).execute(db).await?;
    Ok(result.rows_affected() == 1)
}

pub async fn list(db: &PgPool, product_id: Uuid, paging: PageParams) -> Result<(Vec<ReviewView>, i64), sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(db)
        .await?;
    let rows = sqlx::query_as::<_, ReviewView>(
        "SELECT r.*, u.name AS reviewer_name FROM reviews r JOIN users u ON u.id = r.buyer_id
         WHERE r.product_id = $1 ORDER BY r.created_at DESC, r.id LIMIT $2 OFFSET $3",
    )
    .bind(product_id)
    .bind(paging.limit())
    .bind(paging.offset())
    .fetch_all(db)
    .await?;
    Ok((rows, total))
}

/// `(rating, count)` per star for one product.
pub async fn rating_counts(db: impl PgExecutor<'_>, product_id: Uuid) -> Result<Vec<(i32, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (i32, i64)>("SELECT rating, COUNT(*) FROM reviews WHERE product_id = $1 GROUP BY rating")
        .bind(product_id)
        .fetch_all(db)
        .await
}
