//! HTTP routes, nested under `/api/v1`.

mod addresses;
mod cart;
mod orders;
mod products;
mod reviews;
mod users;
mod wishlist;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::ValidationError;

use crate::domain::aggregates::address::is_valid_phone;
use crate::state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(users::routes())
        .merge(products::routes())
        .merge(cart::routes())
        .merge(orders::routes())
        .merge(wishlist::routes())
        .merge(addresses::routes())
        .merge(reviews::routes());

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "marketplace-api" }))
}

pub(crate) fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if is_valid_phone(phone) { Ok(()) } else { Err(ValidationError::new("phone")) }
}
