//! The buyer's cart and checkout.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use crate::auth::BuyerUser;
use crate::db::carts;
use crate::db::products::{Product, Variant};
use crate::domain::aggregates::cart::merged_quantity;
use crate::domain::aggregates::Cart;
use crate::domain::value_objects::Quantity;
use crate::error::{AppError, Result};
use crate::extract::{OptionalJson, Path, ValidatedJson};
use crate::services::checkout::{self, CheckoutReceipt, Purchase};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/:item_id", patch(update_item).delete(remove_item))
        .route("/cart/checkout", post(checkout_cart))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1, max = 100))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(range(max = 100))]
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: Option<Uuid>,
}

async fn load(conn: &mut PgConnection, cart_id: Uuid, buyer_id: Uuid, currency: &str) -> Result<Cart> {
    let lines = carts::lines(&mut *conn, cart_id).await?;
    Ok(Cart::with_lines(cart_id, buyer_id, lines.into_iter().map(|r| r.into_line(currency)).collect(), currency))
}

async fn current(state: &AppState, buyer_id: Uuid) -> Result<Cart> {
    let mut conn = state.db.acquire().await?;
    match carts::find_id(&mut *conn, buyer_id).await? {
        Some(cart_id) => load(&mut conn, cart_id, buyer_id, state.currency()).await,
        None => Ok(Cart::empty(buyer_id, state.currency())),
    }
}

/// Adds `adding` units to the buyer's cart, merging with an existing line.
///
/// Creates the cart on first use. Fails without writing anything when the
/// merged quantity exceeds the line limit or the available stock.
pub(crate) async fn add_line(
    conn: &mut PgConnection,
    buyer_id: Uuid,
    product: &Product,
    variant: Option<&Variant>,
    adding: u32,
    currency: &str,
) -> Result<()> {
    let available = Quantity::from_stock(variant.map_or(product.stock, |v| v.stock));
    let variant_id = variant.map(|v| v.id);

    let cart_id = carts::get_or_create(&mut *conn, buyer_id).await?;
    let cart = load(conn, cart_id, buyer_id, currency).await?;
    let existing = cart.find_line(product.id, variant_id);
    let quantity = merged_quantity(existing.map(|l| l.quantity), adding, available)?;
    let quantity = i32::try_from(quantity).map_err(|_| AppError::BadRequest("quantity out of range".into()))?;

    match existing {
        Some(line) => {
            carts::set_quantity(&mut *conn, cart_id, line.id, quantity).await?;
        }
        None => {
            carts::insert_item(&mut *conn, cart_id, product.id, variant_id, quantity).await?;
        }
    }
    Ok(())
}

async fn get_cart(State(state): State<AppState>, BuyerUser(buyer_id): BuyerUser) -> Result<Json<Cart>> {
    Ok(Json(current(&state, buyer_id).await?))
}

async fn add_item(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    ValidatedJson(req): ValidatedJson<AddItemRequest>,
) -> Result<(StatusCode, Json<Cart>)> {
    let (product, variant) = checkout::resolve_item(&state.db, req.product_id, req.variant_id).await?;

    let mut tx = state.db.begin().await?;
    add_line(&mut tx, buyer_id, &product, variant.as_ref(), req.quantity, state.currency()).await?;
    tx.commit().await?;

    tracing::info!(%buyer_id, product_id = %product.id, quantity = req.quantity, "Added to cart");
    Ok((StatusCode::CREATED, Json(current(&state, buyer_id).await?)))
}

async fn update_item(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    Path(item_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateItemRequest>,
) -> Result<Json<Cart>> {
    let mut conn = state.db.acquire().await?;
    let cart_id = carts::find_id(&mut *conn, buyer_id).await?.ok_or_else(|| AppError::not_found("Cart item"))?;
    let cart = load(&mut conn, cart_id, buyer_id, state.currency()).await?;
    let line = cart.line(item_id).ok_or_else(|| AppError::not_found("Cart item"))?;

    if req.quantity == 0 {
        carts::remove_item(&mut *conn, cart_id, item_id).await?;
    } else {
        let quantity = merged_quantity(None, req.quantity, line.available)?;
        let quantity = i32::try_from(quantity).map_err(|_| AppError::BadRequest("quantity out of range".into()))?;
        carts::set_quantity(&mut *conn, cart_id, item_id, quantity).await?;
    }
    drop(conn);

    tracing::info!(%buyer_id, %item_id, quantity = req.quantity, "Cart item updated");
    Ok(Json(current(&state, buyer_id).await?))
}

async fn remove_item(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Cart>> {
    let removed = match carts::find_id(&state.db, buyer_id).await? {
        Some(cart_id) => carts::remove_item(&state.db, cart_id, item_id).await?,
        None => false,
    };
    if !removed {
        return Err(AppError::not_found("Cart item"));
    }
    Ok(Json(current(&state, buyer_id).await?))
}

async fn clear_cart(State(state): State<AppState>, BuyerUser(buyer_id): BuyerUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await?;
    if let Some(cart_id) = carts::find_id(&mut *conn, buyer_id).await? {
        carts::clear(&mut conn, cart_id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn checkout_cart(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    OptionalJson(body): OptionalJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutReceipt>)> {
    let address_id = body.and_then(|req| req.address_id);
    let receipt = checkout::checkout(&state, buyer_id, Purchase::Cart, address_id).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
