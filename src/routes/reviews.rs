//! Product reviews and rating summaries.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthUser, BuyerUser};
use crate::db::reviews::{self, Review, ReviewFields, ReviewView};
use crate::db::{orders, products, PageParams, Paginated};
use crate::domain::aggregates::{ProductStatus, RatingSummary};
use crate::error::{AppError, Result};
use crate::extract::{Path, Query, ValidatedJson};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products/:id/reviews", get(list_reviews).post(create_review))
        .route("/reviews/:id", put(update_review).delete(delete_review))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub body: Option<String>,
}

impl ReviewRequest {
    fn fields(&self) -> ReviewFields<'_> {
        ReviewFields {
            rating: self.rating,
            title: self.title.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            body: self.body.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewPage {
    pub summary: RatingSummary,
    #[serde(flatten)]
    pub page: Paginated<ReviewView>,
}

async fn approved_product(state: &AppState, id: Uuid) -> Result<()> {
    products::find(&state.db, id)
        .await?
        .filter(|p| p.status == ProductStatus::Approved)
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("Product"))
}

async fn create_review(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    Path(product_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    approved_product(&state, product_id).await?;
    let verified = orders::has_delivered_purchase(&state.db, buyer_id, product_id).await?;
    let review = reviews::insert(&state.db, product_id, buyer_id, &req.fields(), verified).await?;

    tracing::info!(review_id = %review.id, %product_id, %buyer_id, verified, "Review created");
    Ok((StatusCode::CREATED, Json(review)))
}

async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(paging): Query<PageParams>,
) -> Result<Json<ReviewPage>> {
    approved_product(&state, product_id).await?;
    let summary = RatingSummary::from_counts(&reviews::rating_counts(&state.db, product_id).await?);
    let (data, total) = reviews::list(&state.db, product_id, paging).await?;
    Ok(Json(ReviewPage { summary, page: Paginated::new(data, total, paging) }))
}

async fn update_review(
    State(state): State<AppState>,
    BuyerUser(buyer_id): BuyerUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ReviewRequest>,
) -> Result<Json<Review>> {
    let review = reviews::update(&state.db, id, buyer_id, &req.fields())
        .await?
        .ok_or_else(|| AppError::not_found("Review"))?;
    Ok(Json(review))
}

/// The author or an admin may delete a review.
async fn delete_review(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    reviews::find(&state.db, id)
        .await?
        .filter(|r| auth.is_admin() || r.buyer_id == auth.user_id)
        .ok_or_else(|| AppError::not_found("Review"))?;
    reviews::delete(&state.db, id).await?;

    tracing::info!(review_id = %id, by_admin = auth.is_admin(), "Review deleted");
    Ok(StatusCode::NO_CONTENT)
}
