//! Carts and cart items.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgExecutor};
use uuid::Uuid;

use crate::domain::aggregates::{CartLine, ProductStatus, UnitPrice};
use crate::domain::value_objects::Quantity;

/// A cart item joined with its product and optional variant.
#[derive(Debug, Clone, FromRow)]
pub struct CartLineRow {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub seller_id: Uuid,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub price: Decimal,
    pub variant_price: Option<Decimal>,
    pub discount_percent: i32,
    pub quantity: i32,
    pub stock: i32,
    pub status: ProductStatus,
}

impl CartLineRow {
    pub fn into_line(self, currency: &str) -> CartLine {
        CartLine::new(
            self.item_id,
            self.product_id,
            self.variant_id,
            self.seller_id,
            self.product_name,
            self.variant_name,
            UnitPrice::resolve(self.price, self.variant_price, self.discount_percent),
            u32::try_from(self.quantity).unwrap_or(0),
            Quantity::from_stock(self.stock),
            self.status == ProductStatus::Approved,
            currency,
        )
    }
}

pub async fn find_id(db: impl PgExecutor<'_>, buyer_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM carts WHERE buyer_id = $1").bind(buyer_id).fetch_optional(db).await
}

/// Returns the buyer's cart, creating it on first use.
pub async fn get_or_create(db: impl PgExecutor<'_>, buyer_id: Uuid) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO carts (id, buyer_id) VALUES ($1, $2)
         ON CONFLICT (buyer_id) DO UPDATE SET updated_at = NOW()
         RETURNING id",
    )
    .bind(Uuid::now_v7())
    .bind(buyer_id)
    .fetch_one(db)
    .await
}

pub async fn lines(db: impl PgExecutor<'_>, cart_id: Uuid) -> Result<Vec<CartLineRow>, sqlx::Error> {
    sqlx::query_as::<_, CartLineRow>(
        "SELECT ci.id AS item_id, ci.product_id, ci.variant_id, p.seller_id, p.name AS product_name,
                v.name AS variant_name, p.price, v.price AS variant_price, p.discount_percent, ci.quantity,
                COALESCE(v.stock, p.stock) AS stock, p.status
         FROM cart_items ci
         JOIN products p ON p.id = ci.product_id
         LEFT JOIN product_variants v ON v.id = ci.variant_id
         WHERE ci.cart_id = $1
         ORDER BY ci.added_at, ci.id",
    )
    .bind(cart_id)
    .fetch_all(db)
    .await
}

/// A line that was never stored in a cart, for buy-now purchases.
pub async fn single_line(
    db: impl PgExecutor<'_>,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
) -> Result<Option<CartLineRow>, sqlx::Error> {
    sqlx::query_as::<_, CartLineRow>(
        "SELECT $4::UUID AS item_id, p.id AS product_id, v.id AS variant_id, p.seller_id, p.name AS product_name,
                v.name AS variant_name, p.price, v.price AS variant_price, p.discount_percent, $3::INT AS quantity,
                COALESCE(v.stock, p.stock) AS stock, p.status
         FROM products p
         LEFT JOIN product_variants v ON v.id = $2 AND v.product_id = p.id
         WHERE p.id = $1",
    )
    .bind(product_id)
    .bind(variant_id)
    .bind(quantity)
    .bind(Uuid::now_v7())
    .fetch_optional(db)
    .await
}

pub async fn insert_item(
    db: impl PgExecutor<'_>,
    cart_id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO cart_items (id, cart_id, product_id, variant_id, quantity) VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(Uuid::now_v7())
    .bind(cart_id)
    .bind(product_id)
    .bind(variant_id)
    .bind(quantity)
    .fetch_one(db)
    .await
}

pub async fn set_quantity(db: impl PgExecutor<'_>, cart_id: Uuid, item_id: Uuid, quantity: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE cart_items SET quantity = $3 WHERE id = $2 AND cart_id = $1")
        .bind(cart_id)
        .bind(item_id)
        .bind(quantity)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn remove_item(db: impl PgExecutor<'_>, cart_id: Uuid, item_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $2 AND cart_id = $1")
        .bind(cart_id)
        .bind(item_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn clear(conn: &mut PgConnection, cart_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart_id).execute(conn).await?;
    Ok(())
}
