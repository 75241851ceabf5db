//! Buyer address book.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgExecutor};
use uuid::Uuid;

use crate::domain::aggregates::ShippingAddress;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Address {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Copy placed on an order.
    pub fn to_shipping(&self) -> ShippingAddress {
        ShippingAddress {
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            line1: self.line1.clone(),
            line2: self.line2.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
        }
    }
}

pub async fn list(db: impl PgExecutor<'_>, buyer_id: Uuid) -> Result<Vec<Address>, sqlx::Error> {
    sqlx::query_as::<_, Address>(
        "SELECT * FROM addresses WHERE buyer_id = $1 ORDER BY is_default DESC, created_at DESC, id",
    )
    .bind(buyer_id)
    .fetch_all(db)
    .await
}

pub async fn count(db: impl PgExecutor<'_>, buyer_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM addresses WHERE buyer_id = $1").bind(buyer_id).fetch_one(db).await
}

pub async fn find(db: impl PgExecutor<'_>, buyer_id: Uuid, id: Uuid) -> Result<Option<Address>, sqlx::Error> {
    sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE id = $1 AND buyer_id = $2")
        .bind(id)
        .bind(buyer_id)
        .fetch_optional(db)
        .await
}

pub async fn find_default(db: impl PgExecutor<'_>, buyer_id: Uuid) -> Result<Option<Address>, sqlx::Error> {
    sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE buyer_id = $1 AND is_default")
        .bind(buyer_id)
        .fetch_optional(db)
        .await
}

pub async fn insert(
    conn: &mut PgConnection,
    buyer_id: Uuid,
    fields: &ShippingAddress,
    is_default: bool,
) -> Result<Address, sqlx::Error> {
    sqlx::query_as::<_, Address>(
        "INSERT INTO addresses (id, buyer_id, full_name, phone, line1, line2, city, state, postal_code, country, is_default)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(buyer_id)
    .bind(&fields.full_name)
    .bind(&fields.phone)
    .bind(&fields.line1)
    .bind(&fields.line2)
    .bind(&fields.city)
    .bind(&fields.state)
    .bind(&fields.postal_code)
    .bind(&fields.country)
    .bind(is_default)
    .fetch_one(conn)
    .await
}

/// Replaces the address fields; `make_default` only ever turns the flag on.
pub async fn update(
    conn: &mut PgConnection,
    buyer_id: Uuid,
    id: Uuid,
    fields: &ShippingAddress,
    make_default: bool,
) -> Result<Option<Address>, sqlx::Error> {
    sqlx::query_as::<_, Address>(
        "UPDATE addresses
         SET full_name = $3, phone = $4, line1 = $5, line2 = $6, city = $7, state = $8, postal_code = $9,
             country = $10, is_default = is_default OR $11, updated_at = NOW()
         WHERE id = $1 AND buyer_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(buyer_id)
    .bind(&fields.full_name)
    .bind(&fields.phone)
    .bind(&fields.line1)
    .bind(&fields.line2)
    .bind(&fields.city)
    .bind(&fields.state)
    .bind(&fields.postal_code)
    .bind(&fields.country)
    .bind(make_default)
    .fetch_optional(conn)
    .await
}

/// Drops the default flag from every address except `keep`.
pub async fn clear_default(conn: &mut PgConnection, buyer_id: Uuid, keep: Option<Uuid>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE addresses SET is_default = FALSE, updated_at = NOW()
         WHERE buyer_id = $1 AND is_default AND ($2::UUID IS NULL OR id <> $2)",
    )
    .bind(buyer_id)
    .bind(keep)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn set_default(conn: &mut PgConnection, buyer_id: Uuid, id: Uuid) -> Result<Option<Address>, sqlx::Error> {
    sqlx::query_as::<_, Address>(
        "UPDATE addresses SET is_default = TRUE, updated_at = NOW() WHERE id = $1 AND buyer_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(buyer_id)
    .fetch_optional(conn)
    .await
}

/// Deletes an address and returns it.
pub async fn delete(conn: &mut PgConnection, buyer_id: Uuid, id: Uuid) -> Result<Option<Address>, sqlx::Error> {
    sqlx::query_as::<_, Address>("DELETE FROM addresses WHERE id = $1 AND buyer_id = $2 RETURNING *")
        .bind(id)
        .bind(buyer_id)
        .fetch_optional(conn)
        .await
}

/// `(id, created_at)` of every address the buyer still has.
pub async fn remaining(conn: &mut PgConnection, buyer_id: Uuid) -> Result<Vec<(Uuid, DateTime<Utc>)>, sqlx::Error> {
    sqlx::query_as::<_, (Uuid, DateTime<Utc>)>("SELECT id, created_at FROM addresses WHERE buyer_id = $1")
        .bind(buyer_id)
        .fetch_all(conn)
        .await
}
