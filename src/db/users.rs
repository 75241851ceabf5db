//! Users and their buyer/seller profiles.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgExecutor};
use uuid::Uuid;

use crate::domain::value_objects::Role;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Option<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BuyerProfile {
    pub user_id: Uuid,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SellerProfile {
    pub user_id: Uuid,
    pub store_name: String,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(
    db: impl PgExecutor<'_>,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Option<Role>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(db)
    .await
}

pub async fn find_by_email(db: impl PgExecutor<'_>, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn find_by_id(db: impl PgExecutor<'_>, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(db).await
}

/// Email addresses for a set of users, used for notifications.
pub async fn emails(db: impl PgExecutor<'_>, ids: &[Uuid]) -> Result<Vec<(Uuid, String)>, sqlx::Error> {
    sqlx::query_as::<_, (Uuid, String)>("SELECT id, email FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(db)
        .await
}

pub async fn set_role(conn: &mut PgConnection, id: Uuid, role: Role) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>("UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(role)
        .fetch_one(conn)
        .await
}

pub async fn set_password(db: impl PgExecutor<'_>, id: Uuid, password_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn insert_buyer(conn: &mut PgConnection, user_id: Uuid, phone: Option<&str>) -> Result<BuyerProfile, sqlx::Error> {
    sqlx::query_as::<_, BuyerProfile>("INSERT INTO buyers (user_id, phone) VALUES ($1, $2) RETURNING *")
        .bind(user_id)
        .bind(phone)
        .fetch_one(conn)
        .await
}

pub async fn insert_seller(
    conn: &mut PgConnection,
    user_id: Uuid,
    store_name: &str,
    tax_id: Option<&str>,
    phone: Option<&str>,
) -> Result<SellerProfile, sqlx::Error> {
    sqlx::query_as::<_, SellerProfile>(
        "INSERT INTO sellers (user_id, store_name, tax_id, phone) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(user_id)
    .bind(store_name)
    .bind(tax_id)
    .bind(phone)
    .fetch_one(conn)
    .await
}

pub async fn find_buyer(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<Option<BuyerProfile>, sqlx::Error> {
    sqlx::query_as::<_, BuyerProfile>("SELECT * FROM buyers WHERE user_id = $1").bind(user_id).fetch_optional(db).await
}

pub async fn find_seller(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<Option<SellerProfile>, sqlx::Error> {
    sqlx::query_as::<_, SellerProfile>("SELECT * FROM sellers WHERE user_id = $1").bind(user_id).fetch_optional(db).await
}
