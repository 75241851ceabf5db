//! Orders for buyers, sellers and admins.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthUser, BuyerUser, SellerUser};
use crate::db::orders::{self, OrderFilter, OrderWithItems, Scope};
use crate::db::{products, users, Paginated};
use crate::domain::aggregates::{Actor, OrderStatus};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::error::{AppError, Result};
use crate::extract::{Path, Query, ValidatedJson};
use crate::services::checkout::{self, CheckoutReceipt, Purchase};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(buy_now))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/seller/orders", get(list_seller_orders))
        .route("/seller/orders/:id/status", patch(update_status))
        .route("/admin/orders", get(list_all_orders))
}

#[derive(Debug, Deserialize, Validate)]
pub struct BuyNowRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1, max = 100))]
    pub quantity: u32,
    pub address_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

async fn buy_now(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    ValidatedJson(req): ValidatedJson<BuyNowRequest>,
) -> Result<(StatusCode, Json<CheckoutReceipt>)> {
    let (product, variant) = checkout::resolve_item(&state.db, req.product_id, req.variant_id).await?;
    let purchase = Purchase::Single { product_id: product.id, variant_id: variant.map(|v| v.id), quantity: req.quantity };
    let receipt = checkout::checkout(&state, buyer_id, purchase, req.address_id).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn list(state: &AppState, scope: Scope, filter: &OrderFilter) -> Result<Json<Paginated<OrderWithItems>>> {
    let (rows, total) = orders::list(&state.db, scope, filter).await?;
    let data = orders::with_items(&state.db, rows).await?;
    Ok(Json(Paginated::new(data, total, filter.paging())))
}

async fn list_orders(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Paginated<OrderWithItems>>> {
    list(&state, Scope::Buyer(buyer_id), &filter).await
}

async fn list_seller_orders(
    State(state): State<AppState>,
    SellerUser(seller_id): SellerUser,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Paginated<OrderWithItems>>> {
    list(&state, Scope::Seller(seller_id), &filter).await
}

async fn list_all_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Paginated<OrderWithItems>>> {
    list(&state, Scope::All, &filter).await
}

/// Visible to the buyer, the seller and admins; everyone else gets `404`.
async fn get_order(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<Json<OrderWithItems>> {
    let order = orders::find(&state.db, id)
        .await?
        .filter(|o| auth.is_admin() || o.buyer_id == auth.user_id || o.seller_id == auth.user_id)
        .ok_or_else(|| AppError::not_found("Order"))?;
    let mut found = orders::with_items(&state.db, vec![order]).await?;
    found.pop().map(Json).ok_or_else(|| AppError::not_found("Order"))
}

async fn cancel_order(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderWithItems>> {
    change_status(&state, id, Actor::Buyer, buyer_id, OrderStatus::Cancelled).await.map(Json)
}

async fn update_status(
    State(state): State<AppState>,
    SellerUser(seller_id): SellerUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<StatusRequest>,
) -> Result<Json<OrderWithItems>> {
    change_status(&state, id, Actor::Seller, seller_id, req.status).await.map(Json)
}

/// Applies a status transition with the order row locked.
///
/// Cancelling puts the ordered quantities back in stock in the same
/// transaction. The other party is emailed after commit.
async fn change_status(state: &AppState, id: Uuid, actor: Actor, actor_id: Uuid, to: OrderStatus) -> Result<OrderWithItems> {
    let mut tx = state.db.begin().await?;
    let order = orders::find_for_update(&mut tx, id)
        .await?
        .filter(|o| match actor {
            Actor::Buyer => o.buyer_id == actor_id,
            Actor::Seller => o.seller_id == actor_id,
        })
        .ok_or_else(|| AppError::not_found("Order"))?;
    let next = order.status.transition(to, actor)?;
    let order = orders::set_status(&mut tx, order.id, next).await?;
    let items = orders::items(&mut *tx, &[order.id]).await?;
    if next == OrderStatus::Cancelled {
        // Same lock order as checkout.
        let product_ids: Vec<Uuid> = items.iter().filter_map(|i| i.product_id).collect();
        let variant_ids: Vec<Uuid> = items.iter().filter_map(|i| i.variant_id).collect();
        products::lock_for_purchase(&mut tx, &product_ids, &variant_ids).await?;
        for item in &items {
            if let Some(product_id) = item.product_id {
                products::return_stock(&mut tx, product_id, item.variant_id, item.quantity).await?;
            }
        }
    }
    tx.commit().await?;

    tracing::info!(order_id = %order.id, status = ?next, ?actor, "Order status changed");
    state.events.publish(DomainEvent::Order(OrderEvent::StatusChanged { order_id: order.id, status: next }));
    let recipient = match actor {
        Actor::Buyer => order.seller_id,
        Actor::Seller => order.buyer_id,
    };
    match users::find_by_id(&state.db, recipient).await {
        Ok(Some(user)) => state.email.order_status(&user.email, order.id, next),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, order_id = %order.id, "Could not notify order party"),
    }
    Ok(OrderWithItems { order, items })
}
