//! Saved-for-later products.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::cart::add_line;
use crate::auth::BuyerUser;
use crate::db::products::{self, ProductView};
use crate::db::wishlist;
use crate::domain::aggregates::ProductStatus;
use crate::error::{AppError, Result};
use crate::extract::{Path, ValidatedJson};
use crate::services::checkout::resolve_item;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wishlist", get(list).post(add))
        .route("/wishlist/:product_id", delete(remove))
        .route("/wishlist/:product_id/move-to-cart", post(move_to_cart))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddRequest {
    pub product_id: Uuid,
}

async fn list(State(state): State<AppState>, BuyerUser(buyer_id): BuyerUser) -> Result<Json<Vec<ProductView>>> {
    let rows = wishlist::list(&state.db, buyer_id).await?;
    Ok(Json(rows.into_iter().map(|r| ProductView::new(r, None)).collect()))
}

async fn add(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    ValidatedJson(req): ValidatedJson<AddRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    products::find(&state.db, req.product_id)
        .await?
        .filter(|p| p.status == ProductStatus::Approved)
        .ok_or_else(|| AppError::not_found("Product"))?;
    wishlist::add(&state.db, buyer_id, req.product_id).await?;

    tracing::info!(%buyer_id, product_id = %req.product_id, "Added to wishlist");
    Ok((StatusCode::CREATED, Json(json!({ "product_id": req.product_id }))))
}

async fn remove(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode> {
    if !wishlist::remove(&state.db, buyer_id, product_id).await? {
        return Err(AppError::not_found("Wishlist item"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Adds one unit to the cart and drops the wishlist entry, atomically.
async fn move_to_cart(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode> {
    let (product, _) = resolve_item(&state.db, product_id, None).await?;

    let mut tx = state.db.begin().await?;
    if !wishlist::remove(&mut *tx, buyer_id, product_id).await? {
        return Err(AppError::not_found("Wishlist item"));
    }
    add_line(&mut tx, buyer_id, &product, None, 1, state.currency()).await?;
    tx.commit().await?;

    tracing::info!(%buyer_id, %product_id, "Moved wishlist item to cart");
    Ok(StatusCode::NO_CONTENT)
}
