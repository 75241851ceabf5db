//! Orders and their line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::PageParams;
use crate::domain::aggregates::{OrderDraft, OrderStatus, ShippingAddress};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub checkout_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub total: Decimal,
    pub shipping_address: Json<ShippingAddress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub unit_price: Decimal,
    pub discount_percent: i32,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Who a listing is scoped to.
#[derive(Debug, Clone, Copy)]
pub enum Scope {
    Buyer(Uuid),
    Seller(Uuid),
    All,
}

/// `status` filter plus paging.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl OrderFilter {
    pub fn paging(&self) -> PageParams { PageParams { page: self.page, per_page: self.per_page } }
}

pub async fn insert_draft(
    conn: &mut PgConnection,
    checkout_id: Uuid,
    buyer_id: Uuid,
    draft: &OrderDraft,
    address: &ShippingAddress,
) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (id, checkout_id, buyer_id, seller_id, subtotal, discount_total, total, shipping_address)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(draft.id)
    .bind(checkout_id)
    .bind(buyer_id)
    .bind(draft.seller_id)
    .bind(draft.subtotal.amount())
    .bind(draft.discount_total.amount())
    .bind(draft.total.amount())
    .bind(Json(address))
    .fetch_one(&mut *conn)
    .await?;

    for item in &draft.items {
        sqlx::query(
            "INSERT INTO order_items
                 (id, order_id, product_id, variant_id, product_name, variant_name, unit_price, discount_percent, quantity, line_total)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(Uuid::now_v7())
        .bind(order.id)
        .bind(item.product_id)
        .bind(item.variant_id)
        .bind(&item.product_name)
        .bind(&item.variant_name)
        .bind(item.unit_price)
        .bind(item.discount_percent)
        .bind(i32::try_from(item.quantity).unwrap_or(i32::MAX))
        .bind(item.line_total)
        .execute(&mut *conn)
        .await?;
    }
    Ok(order)
}

pub async fn find(db: impl PgExecutor<'_>, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(db).await
}

/// Loads an order and holds its row lock for the rest of the transaction.
pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE").bind(id).fetch_optional(conn).await
}

pub async fn items(db: impl PgExecutor<'_>, order_ids: &[Uuid]) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, id")
        .bind(order_ids)
        .fetch_all(db)
        .await
}

/// Attaches line items to each order, keeping the order of `orders`.
pub async fn with_items(db: impl PgExecutor<'_>, orders: Vec<Order>) -> Result<Vec<OrderWithItems>, sqlx::Error> {
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items = items(db, &ids).await?;
    Ok(orders
        .into_iter()
        .map(|order| {
            let (mine, rest): (Vec<_>, Vec<_>) = items.drain(..).partition(|i| i.order_id == order.id);
            items = rest;
            OrderWithItems { order, items: mine }
        })
        .collect())
}

pub async fn list(db: &PgPool, scope: Scope, filter: &OrderFilter) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let (buyer_id, seller_id) = match scope {
        Scope::Buyer(id) => (Some(id), None),
        Scope::Seller(id) => (None, Some(id)),
        Scope::All => (None, None),
    };
    let paging = filter.paging();
    let condition = "WHERE ($1::UUID IS NULL OR buyer_id = $1)
                       AND ($2::UUID IS NULL OR seller_id = $2)
                       AND ($3::order_status IS NULL OR status = $3)";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders {condition}"))
        .bind(buyer_id)
        .bind(seller_id)
        .bind(filter.status)
        .fetch_one(db)
        .await?;
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT * FROM orders {condition} ORDER BY created_at DESC, id LIMIT $4 OFFSET $5"
    ))
    .bind(buyer_id)
    .bind(seller_id)
    .bind(filter.status)
    .bind(paging.limit())
    .bind(paging.offset())
    .fetch_all(db)
    .await?;
    Ok((orders, total))
}

pub async fn set_status(conn: &mut PgConnection, id: Uuid, status: OrderStatus) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(status)
        .fetch_one(conn)
        .await
}

/// Whether the buyer has a delivered order containing this product.
pub async fn has_delivered_purchase(db: impl PgExecutor<'_>, buyer_id: Uuid, product_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (
             SELECT 1 FROM orders o JOIN order_items oi ON oi.order_id = o.id
             WHERE o.buyer_id = $1 AND oi.product_id = $2 AND o.status = 'DELIVERED'
         )",
    )
    .bind(buyer_id)
    .bind(product_id)
    .fetch_one(db)
    .await
}
