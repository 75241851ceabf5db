//! Buyer address book.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::validate_phone;
use crate::auth::BuyerUser;
use crate::db::addresses::{self, Address};
use crate::domain::aggregates::address::{default_on_create, successor, MAX_ADDRESSES};
use crate::domain::aggregates::ShippingAddress;
use crate::error::{AppError, Result};
use crate::extract::{Path, ValidatedJson};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/addresses", get(list).post(create))
        .route("/addresses/:id", put(update).delete(remove))
        .route("/addresses/:id/default", patch(make_default))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(length(min = 7, max = 20), custom = "validate_phone")]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    #[validate(length(max = 200))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 3, max = 12))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 56))]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressRequest {
    fn fields(&self) -> ShippingAddress {
        ShippingAddress {
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            line1: self.line1.trim().to_string(),
            line2: self.line2.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country: self.country.trim().to_string(),
        }
    }
}

async fn list(State(state): State<AppState>, BuyerUser(buyer_id): BuyerUser) -> Result<Json<Vec<Address>>> {
    Ok(Json(addresses::list(&state.db, buyer_id).await?))
}

async fn create(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    ValidatedJson(req): ValidatedJson<AddressRequest>,
) -> Result<(StatusCode, Json<Address>)> {
    let mut tx = state.db.begin().await?;
    let existing = addresses::count(&mut *tx, buyer_id).await?;
    if existing >= MAX_ADDRESSES {
        return Err(AppError::BadRequest(format!("At most {MAX_ADDRESSES} addresses are allowed")));
    }
    let is_default = default_on_create(existing, req.is_default);
    if is_default {
        addresses::clear_default(&mut tx, buyer_id, None).await?;
    }
    let address = addresses::insert(&mut tx, buyer_id, &req.fields(), is_default).await?;
    tx.commit().await?;

    tracing::info!(%buyer_id, address_id = %address.id, is_default, "Address created");
    Ok((StatusCode::CREATED, Json(address)))
}

async fn update(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AddressRequest>,
) -> Result<Json<Address>> {
    let mut tx = state.db.begin().await?;
    if req.is_default {
        addresses::clear_default(&mut tx, buyer_id, Some(id)).await?;
    }
    let address = addresses::update(&mut tx, buyer_id, id, &req.fields(), req.is_default)
        .await?
        .ok_or_else(|| AppError::not_found("Address"))?;
    tx.commit().await?;
    Ok(Json(address))
}

/// Deleting the default promotes the newest remaining address.
async fn remove(State(state): State<AppState>, BuyerUser(buyer_id): BuyerUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let mut tx = state.db.begin().await?;
    let deleted = addresses::delete(&mut tx, buyer_id, id).await?.ok_or_else(|| AppError::not_found("Address"))?;
    if deleted.is_default {
        if let Some(next) = successor(&addresses::remaining(&mut tx, buyer_id).await?) {
            addresses::set_default(&mut tx, buyer_id, next).await?;
        }
    }
    tx.commit().await?;

    tracing::info!(%buyer_id, address_id = %id, "Address deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn make_default(State(state): State<AppState>, BuyerUser(buyer_id): BuyerUser, Path(id): Path<Uuid>) -> Result<Json<Address>> {
    let mut tx = state.db.begin().await?;
    addresses::clear_default(&mut tx, buyer_id, Some(id)).await?;
    let address = addresses::set_default(&mut tx, buyer_id, id).await?.ok_or_else(|| AppError::not_found("Address"))?;
    tx.commit().await?;
    Ok(Json(address))
}
