//! Saved-for-later products.

use sqlx::PgExecutor;
use uuid::Uuid;

use super::products::{listing_select, ProductWithRating};

/// Wishlisted products that are on sale, most recently saved first.
pub async fn list(db: impl PgExecutor<'_>, buyer_id: Uuid) -> Result<Vec<ProductWithRating>, sqlx::Error> {
    let sql = format!(
        "{} JOIN wishlist_items w ON w.product_id = p.id WHERE w.buyer_id = $1 AND p.status = 'APPROVED' ORDER BY w.added_at DESC, p.id",
        listing_select()
    );
    sqlx::query_as::<_, ProductWithRating>(&sql).bind(buyer_id).fetch_all(db).await
}

pub async fn add(db: impl PgExecutor<'_>, buyer_id: Uuid, product_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO wishlist_items (buyer_id, product_id) VALUES ($1, $2)")
        .bind(buyer_id)
        .bind(product_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn remove(db: impl PgExecutor<'_>, buyer_id: Uuid, product_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM wishlist_items WHERE buyer_id = $1 AND product_id = $2")
        .bind(buyer_id)
        .bind(product_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}
