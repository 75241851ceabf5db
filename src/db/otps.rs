//! Pending role assignment codes, one per user.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::auth::codes::PendingOtp;
use crate::domain::value_objects::Role;

#[derive(Debug, FromRow)]
struct OtpRow {
    user_id: Uuid,
    code_hash: String,
    role: Role,
    attempts: i32,
    expires_at: DateTime<Utc>,
}

impl From<OtpRow> for PendingOtp {
    fn from(r: OtpRow) -> Self {
        Self { user_id: r.user_id, code_hash: r.code_hash, role: r.role, attempts: r.attempts, expires_at: r.expires_at }
    }
}

/// Store a new code, replacing any earlier one for the user.
pub async fn replace(
    db: impl PgExecutor<'_>,
    user_id: Uuid,
    code_hash: &str,
    role: Role,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO otps (id, user_id, code_hash, role, attempts, expires_at) VALUES ($1, $2, $3, $4, 0, $5)
         ON CONFLICT (user_id) DO UPDATE
         SET code_hash = EXCLUDED.code_hash, role = EXCLUDED.role, attempts = 0,
             expires_at = EXCLUDED.expires_at, created_at = NOW()",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(code_hash)
    .bind(role)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn find(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<Option<PendingOtp>, sqlx::Error> {
    let row = sqlx::query_as::<_, OtpRow>(
        "SELECT user_id, code_hash, role, attempts, expires_at FROM otps WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row.map(PendingOtp::from))
}

pub async fn record_failure(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE otps SET attempts = attempts + 1 WHERE user_id = $1").bind(user_id).execute(db).await?;
    Ok(())
}

pub async fn delete(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM otps WHERE user_id = $1").bind(user_id).execute(db).await?;
    Ok(())
}
