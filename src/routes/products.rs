//! Catalog: public browsing, seller listings and admin verification.

use std::collections::HashSet;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::{AdminUser, SellerUser};
use crate::db::products::{self, Product, ProductFields, ProductFilter, ProductView, ProductWithRating, Variant};
use crate::db::{users, PageParams, Paginated};
use crate::domain::aggregates::product::{review_transition, validate_specifications};
use crate::domain::aggregates::{ProductCategory, ProductStatus};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::Sku;
use crate::error::{AppError, Result};
use crate::extract::{Path, Query, ValidatedJson};
use crate::state::AppState;

const MAX_VARIANTS: usize = 50;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
        .route("/seller/products", get(list_my_products).post(create_product))
        .route("/seller/products/:id", get(get_my_product).put(update_product).delete(delete_product))
        .route("/seller/products/:id/variants", post(add_variant))
        .route("/seller/products/:id/variants/:variant_id", delete(delete_variant))
        .route("/seller/products/:id/stock", patch(update_stock))
        .route("/admin/products", get(list_for_review))
        .route("/admin/products/:id", delete(admin_delete_product))
        .route("/admin/products/:id/status", patch(set_status))
}

fn validate_price(price: &Decimal) -> std::result::Result<(), ValidationError> {
    let max = Decimal::new(10_000_000, 0);
    if *price <= Decimal::ZERO || *price > max || price.normalize().scale() > 2 {
        return Err(ValidationError::new("price"));
    }
    Ok(())
}

fn empty_object() -> Value { Value::Object(Default::default()) }

/// Product fields. `variants` are only read on create; afterwards they are
/// managed through the variant endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 2, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    pub category: ProductCategory,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[serde(default)]
    #[validate(range(min = 0, max = 90))]
    pub discount_percent: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock: i32,
    #[serde(default = "empty_object")]
    pub specifications: Value,
    #[serde(default)]
    #[validate]
    pub variants: Vec<VariantRequest>,
}

impl ProductRequest {
    fn fields(&self) -> Result<ProductFields<'_>> {
        validate_specifications(self.category, &self.specifications)?;
        Ok(ProductFields {
            name: self.name.trim(),
            description: self.description.trim(),
            category: self.category,
            price: self.price,
            discount_percent: self.discount_percent,
            stock: self.stock,
            specifications: &self.specifications,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct VariantRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock: i32,
}

impl VariantRequest {
    fn sku(&self) -> Result<Sku> {
        Sku::new(self.sku.as_str()).map_err(|e| AppError::BadRequest(e.to_string()))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StockRequest {
    #[validate(range(min = 0))]
    pub stock: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: ProductStatus,
    #[validate(length(min = 1, max = 500))]
    pub reason: Option<String>,
}

/// `status` filter plus paging for seller and admin listings.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<ProductStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl StatusQuery {
    fn paging(&self) -> PageParams { PageParams { page: self.page, per_page: self.per_page } }
}

fn fresh(product: Product) -> ProductWithRating { ProductWithRating { product, stars_1: 0, stars_2: 0, stars_3: 0, stars_4: 0, stars_5: 0 } }

async fn view(state: &AppState, id: Uuid, approved_only: bool) -> Result<ProductView> {
    let row = products::find_with_rating(&state.db, id, approved_only)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    let variants = products::variants(&state.db, id).await?;
    Ok(ProductView::new(row, Some(variants)))
}

async fn list_products(State(state): State<AppState>, Query(filter): Query<ProductFilter>) -> Result<Json<Paginated<ProductView>>> {
    let (rows, total) = products::list_public(&state.db, &filter).await?;
    let data = rows.into_iter().map(|r| ProductView::new(r, None)).collect();
    Ok(Json(Paginated::new(data, total, filter.paging())))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ProductView>> {
    Ok(Json(view(&state, id, true).await?))
}

async fn list_my_products(
    State(state): State<AppState>,
    SellerUser(seller_id): SellerUser,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Paginated<ProductView>>> {
    let (rows, total) = products::list_by(&state.db, Some(seller_id), query.status, query.paging()).await?;
    let data = rows.into_iter().map(|r| ProductView::new(r, None)).collect();
    Ok(Json(Paginated::new(data, total, query.paging())))
}

async fn get_my_product(
    State(state): State<AppState>,
    SellerUser(seller_id): SellerUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductView>> {
    products::find_owned(&state.db, id, seller_id).await?.ok_or_else(|| AppError::not_found("Product"))?;
    Ok(Json(view(&state, id, false).await?))
}

async fn create_product(
    State(state): State<AppState>,
    SellerUser(seller_id): SellerUser,
    ValidatedJson(req): ValidatedJson<ProductRequest>,
) -> Result<(StatusCode, Json<ProductView>)> {
    let fields = req.fields()?;
    if req.variants.len() > MAX_VARIANTS {
        return Err(AppError::BadRequest(format!("At most {MAX_VARIANTS} variants are allowed")));
    }
    let skus = req.variants.iter().map(VariantRequest::sku).collect::<Result<Vec<_>>>()?;
    if skus.iter().collect::<HashSet<_>>().len() != skus.len() {
        return Err(AppError::conflict("Variant SKUs must be unique"));
    }

    let mut tx = state.db.begin().await?;
    let product = products::insert(&mut tx, seller_id, &fields).await?;
    let mut variants = Vec::with_capacity(req.variants.len());
    for (variant, sku) in req.variants.iter().zip(&skus) {
        variants.push(
            products::insert_variant(&mut *tx, product.id, variant.name.trim(), sku.as_str(), variant.price, variant.stock)
                .await?,
        );
    }
    tx.commit().await?;

    tracing::info!(product_id = %product.id, %seller_id, variants = variants.len(), "Product created");
    state.events.publish(DomainEvent::Product(ProductEvent::Created { product_id: product.id, seller_id }));
    Ok((StatusCode::CREATED, Json(ProductView::new(fresh(product), Some(variants)))))
}

async fn update_product(
    State(state): State<AppState>,
    SellerUser(seller_id): SellerUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ProductRequest>,
) -> Result<Json<ProductView>> {
    let fields = req.fields()?;
    products::update(&state.db, id, seller_id, &fields).await?.ok_or_else(|| AppError::not_found("Product"))?;

    tracing::info!(product_id = %id, %seller_id, "Product updated, awaiting review");
    Ok(Json(view(&state, id, false).await?))
}

async fn delete_product(
    State(state): State<AppState>,
    SellerUser(seller_id): SellerUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    remove(&state, id, Some(seller_id)).await
}

async fn admin_delete_product(State(state): State<AppState>, _admin: AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    remove(&state, id, None).await
}

async fn remove(state: &AppState, id: Uuid, seller_id: Option<Uuid>) -> Result<StatusCode> {
    if !products::delete(&state.db, id, seller_id).await? {
        return Err(AppError::not_found("Product"));
    }
    tracing::info!(product_id = %id, by_admin = seller_id.is_none(), "Product deleted");
    state.events.publish(DomainEvent::Product(ProductEvent::Deleted { product_id: id }));
    Ok(StatusCode::NO_CONTENT)
}

async fn add_variant(
    State(state): State<AppState>,
    SellerUser(seller_id): SellerUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<VariantRequest>,
) -> Result<(StatusCode, Json<Variant>)> {
    let sku = req.sku()?;
    let product = products::find_owned(&state.db, id, seller_id).await?.ok_or_else(|| AppError::not_found("Product"))?;
    if usize::try_from(products::variant_count(&state.db, product.id).await?).unwrap_or(usize::MAX) >= MAX_VARIANTS {
        return Err(AppError::BadRequest(format!("At most {MAX_VARIANTS} variants are allowed")));
    }
    let variant = products::insert_variant(&state.db, product.id, req.name.trim(), sku.as_str(), req.price, req.stock).await?;

    tracing::info!(product_id = %product.id, variant_id = %variant.id, "Variant added");
    Ok((StatusCode::CREATED, Json(variant)))
}

async fn delete_variant(
    State(state): State<AppState>,
    SellerUser(seller_id): SellerUser,
    Path((id, variant_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    products::find_owned(&state.db, id, seller_id).await?.ok_or_else(|| AppError::not_found("Product"))?;
    if !products::delete_variant(&state.db, id, variant_id).await? {
        return Err(AppError::not_found("Variant"));
    }
    tracing::info!(product_id = %id, %variant_id, "Variant deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn update_stock(
    State(state): State<AppState>,
    SellerUser(seller_id): SellerUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<StockRequest>,
) -> Result<Json<Product>> {
    let product = products::set_stock(&state.db, id, seller_id, req.stock)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    tracing::info!(product_id = %id, stock = req.stock, "Stock updated");
    Ok(Json(product))
}

async fn list_for_review(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Paginated<ProductView>>> {
    let status = query.status.unwrap_or(ProductStatus::Pending);
    let (rows, total) = products::list_by(&state.db, None, Some(status), query.paging()).await?;
    let data = rows.into_iter().map(|r| ProductView::new(r, None)).collect();
    Ok(Json(Paginated::new(data, total, query.paging())))
}

async fn set_status(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<StatusRequest>,
) -> Result<Json<Product>> {
    let reason = review_transition(req.status, req.reason.as_deref())?;
    let product = products::set_status(&state.db, id, req.status, reason.as_deref())
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    tracing::info!(product_id = %id, %admin_id, status = ?req.status, "Product reviewed");
    state.events.publish(DomainEvent::Product(ProductEvent::StatusChanged {
        product_id: id,
        seller_id: product.seller_id,
        status: product.status,
    }));
    match users::find_by_id(&state.db, product.seller_id).await {
        Ok(Some(seller)) => state.email.product_status(&seller.email, &product.name, product.status, reason.as_deref()),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, product_id = %id, "Could not notify seller"),
    }
    Ok(Json(product))
}
