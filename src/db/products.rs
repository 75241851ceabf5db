//! Products and their variants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use super::PageParams;
use crate::domain::aggregates::{ProductCategory, ProductStatus, RatingSummary, UnitPrice};

/// Effective (discounted) price, computed the same way as `discounted_price`.
const EFFECTIVE_PRICE_SQL: &str = "ROUND(p.price * (100 - p.discount_percent) / 100.0, 2)";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: ProductCategory,
    pub price: Decimal,
    pub discount_percent: i32,
    pub stock: i32,
    pub specifications: Value,
    pub status: ProductStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn unit_price(&self, variant: Option<&Variant>) -> UnitPrice {
        UnitPrice::resolve(self.price, variant.and_then(|v| v.price), self.discount_percent)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: Option<Decimal>,
    pub stock: i32,
}

/// A product row with its per-star review counts, as returned by listings.
#[derive(Debug, Clone, FromRow)]
pub struct ProductWithRating {
    #[sqlx(flatten)]
    pub product: Product,
    pub stars_1: i64,
    pub stars_2: i64,
    pub stars_3: i64,
    pub stars_4: i64,
    pub stars_5: i64,
}

impl ProductWithRating {
    pub fn rating(&self) -> RatingSummary {
        RatingSummary::from_histogram([self.stars_1, self.stars_2, self.stars_3, self.stars_4, self.stars_5])
    }
}

/// Product as shown to shoppers.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub effective_price: Decimal,
    pub rating: RatingSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<VariantView>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantView {
    #[serde(flatten)]
    pub variant: Variant,
    pub effective_price: Decimal,
}

impl ProductView {
    pub fn new(row: ProductWithRating, variants: Option<Vec<Variant>>) -> Self {
        let effective_price = row.product.unit_price(None).effective;
        let variants = variants.map(|vs| {
            vs.into_iter()
                .map(|v| VariantView { effective_price: row.product.unit_price(Some(&v)).effective, variant: v })
                .collect()
        });
        Self {
            rating: row.rating(),
            effective_price,
            product: row.product,
            variants,
        }
    }
}

/// Editable product fields.
#[derive(Debug, Clone)]
pub struct ProductFields<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub category: ProductCategory,
    pub price: Decimal,
    pub discount_percent: i32,
    pub stock: i32,
    pub specifications: &'a Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder { #[default] Newest, PriceAsc, PriceDesc, Rating }

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY p.created_at DESC, p.id",
            Self::PriceAsc => " ORDER BY effective_price ASC, p.id",
            Self::PriceDesc => " ORDER BY effective_price DESC, p.id",
            Self::Rating => " ORDER BY avg_rating DESC NULLS LAST, review_count DESC, p.id",
        }
    }
}

/// Catalog filters for public listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<ProductCategory>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
    pub seller_id: Option<Uuid>,
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub sort: SortOrder,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductFilter {
    pub fn paging(&self) -> PageParams { PageParams { page: self.page, per_page: self.per_page } }

    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE p.status = 'APPROVED'");
        if let Some(category) = self.category {
            qb.push(" AND p.category = ").push_bind(category);
        }
        if let Some(min) = self.min_price {
            qb.push(format!(" AND {EFFECTIVE_PRICE_SQL} >= ")).push_bind(min);
        }
        if let Some(max) = self.max_price {
            qb.push(format!(" AND {EFFECTIVE_PRICE_SQL} <= ")).push_bind(max);
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (p.name ILIKE ").push_bind(pattern.clone()).push(" OR p.description ILIKE ").push_bind(pattern).push(")");
        }
        if let Some(seller_id) = self.seller_id {
            qb.push(" AND p.seller_id = ").push_bind(seller_id);
        }
        if self.in_stock == Some(true) {
            qb.push(" AND (p.stock > 0 OR EXISTS (SELECT 1 FROM product_variants v WHERE v.product_id = p.id AND v.stock > 0))");
        }
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

pub(super) fn listing_select() -> String {
    format!(
        "SELECT p.*, rs.*, {EFFECTIVE_PRICE_SQL} AS effective_price FROM products p
         LEFT JOIN LATERAL (
             SELECT AVG(r.rating)::NUMERIC AS avg_rating, COUNT(r.id) AS review_count,
                    COUNT(*) FILTER (WHERE r.rating = 1) AS stars_1,
                    COUNT(*) FILTER (WHERE r.rating = 2) AS stars_2,
                    COUNT(*) FILTER (WHERE r.rating = 3) AS stars_3,
                    COUNT(*) FILTER (WHERE r.rating = 4) AS stars_4,
                    COUNT(*) FILTER (WHERE r.rating = 5) AS stars_5
             FROM reviews r WHERE r.product_id = p.id
         ) rs ON TRUE"
    )
}

pub async fn list_public(db: &sqlx::PgPool, filter: &ProductFilter) -> Result<(Vec<ProductWithRating>, i64), sqlx::Error> {
    let paging = filter.paging();

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
    filter.push_where(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(db).await?;

    let mut select = QueryBuilder::<Postgres>::new(listing_select());
    filter.push_where(&mut select);
    select.push(filter.sort.sql());
    select.push(" LIMIT ").push_bind(paging.limit()).push(" OFFSET ").push_bind(paging.offset());
    let rows = select.build_query_as::<ProductWithRating>().fetch_all(db).await?;
    Ok((rows, total))
}

/// Single product with rating, `approved_only` hides unreviewed listings.
pub async fn find_with_rating(
    db: impl PgExecutor<'_>,
    id: Uuid,
    approved_only: bool,
) -> Result<Option<ProductWithRating>, sqlx::Error> {
    let sql = format!("{} WHERE p.id = $1 AND (NOT $2 OR p.status = 'APPROVED')", listing_select());
    sqlx::query_as::<_, ProductWithRating>(&sql).bind(id).bind(approved_only).fetch_optional(db).await
}

/// Listing for a seller's own catalog or the admin queue.
pub async fn list_by(
    db: &sqlx::PgPool,
    seller_id: Option<Uuid>,
    status: Option<ProductStatus>,
    paging: PageParams,
) -> Result<(Vec<ProductWithRating>, i64), sqlx::Error> {
    let filter = "WHERE ($1::UUID IS NULL OR p.seller_id = $1) AND ($2::product_status IS NULL OR p.status = $2)";
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products p {filter}"))
        .bind(seller_id)
        .bind(status)
        .fetch_one(db)
        .await?;
    let rows = sqlx::query_as::<_, ProductWithRating>(&format!(
        "{} {filter} ORDER BY p.created_at DESC, p.id LIMIT $3 OFFSET $4",
        listing_select()
    ))
    .bind(seller_id)
    .bind(status)
    .bind(paging.limit())
    .bind(paging.offset())
    .fetch_all(db)
    .await?;
    Ok((rows, total))
}

pub async fn find(db: impl PgExecutor<'_>, id: Uuid) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(db).await
}

pub async fn find_owned(db: impl PgExecutor<'_>, id: Uuid, seller_id: Uuid) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND seller_id = $2")
        .bind(id)
        .bind(seller_id)
        .fetch_optional(db)
        .await
}

pub async fn insert(conn: &mut PgConnection, seller_id: Uuid, fields: &ProductFields<'_>) -> Result<Product, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, seller_id, name, description, category, price, discount_percent, stock, specifications)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(seller_id)
    .bind(fields.name)
    .bind(fields.description)
    .bind(fields.category)
    .bind(fields.price)
    .bind(fields.discount_percent)
    .bind(fields.stock)
    .bind(fields.specifications)
    .fetch_one(conn)
    .await
}

/// Replaces the editable fields and sends the product back for review.
pub async fn update(
    db: impl PgExecutor<'_>,
    id: Uuid,
    seller_id: Uuid,
    fields: &ProductFields<'_>,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "UPDATE products
         SET name = $3, description = $4, category = $5, price = $6, discount_percent = $7, stock = $8,
             specifications = $9, status = 'PENDING', rejection_reason = NULL, updated_at = NOW()
         WHERE id = $1 AND seller_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(seller_id)
    .bind(fields.name)
    .bind(fields.description)
    .bind(fields.category)
    .bind(fields.price)
    .bind(fields.discount_percent)
    .bind(fields.stock)
    .bind(fields.specifications)
    .fetch_optional(db)
    .await
}

pub async fn set_stock(db: impl PgExecutor<'_>, id: Uuid, seller_id: Uuid, stock: i32) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "UPDATE products SET stock = $3, updated_at = NOW() WHERE id = $1 AND seller_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(seller_id)
    .bind(stock)
    .fetch_optional(db)
    .await
}

pub async fn set_status(
    db: impl PgExecutor<'_>,
    id: Uuid,
    status: ProductStatus,
    reason: Option<&str>,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "UPDATE products SET status = $2, rejection_reason = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .bind(reason)
    .fetch_optional(db)
    .await
}

/// Deletes a product; `seller_id` restricts the delete to its owner.
pub async fn delete(db: impl PgExecutor<'_>, id: Uuid, seller_id: Option<Uuid>) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1 AND ($2::UUID IS NULL OR seller_id = $2)")
        .bind(id)
        .bind(seller_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn variants(db: impl PgExecutor<'_>, product_id: Uuid) -> Result<Vec<Variant>, sqlx::Error> {
    sqlx::query_as::<_, Variant>("SELECT * FROM product_variants WHERE product_id = $1 ORDER BY name, id")
        .bind(product_id)
        .fetch_all(db)
        .await
}

pub async fn find_variant(db: impl PgExecutor<'_>, product_id: Uuid, variant_id: Uuid) -> Result<Option<Variant>, sqlx::Error> {
    sqlx::query_as::<_, Variant>("SELECT * FROM product_variants WHERE id = $1 AND product_id = $2")
        .bind(variant_id)
        .bind(product_id)
        .fetch_optional(db)
        .await
}

pub async fn variant_count(db: impl PgExecutor<'_>, product_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM product_variants WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(db)
        .await
}

pub async fn insert_variant(
    db: impl PgExecutor<'_>,
    product_id: Uuid,
    name: &str,
    sku: &str,
    price: Option<Decimal>,
    stock: i32,
) -> Result<Variant, sqlx::Error> {
    sqlx::query_as::<_, Variant>(
        "INSERT INTO product_variants (id, product_id, name, sku, price, stock) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(product_id)
    .bind(name)
    .bind(sku)
    .bind(price)
    .bind(stock)
    .fetch_one(db)
    .await
}

pub async fn delete_variant(db: impl PgExecutor<'_>, product_id: Uuid, variant_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM product_variants WHERE id = $1 AND product_id = $2")
        .bind(variant_id)
        .bind(product_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Row-locks products and variants in id order so concurrent checkouts queue up.
pub async fn lock_for_purchase(conn: &mut PgConnection, product_ids: &[Uuid], variant_ids: &[Uuid]) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT id FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(product_ids)
        .execute(&mut *conn)
        .await?;
    if !variant_ids.is_empty() {
        sqlx::query("SELECT id FROM product_variants WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(variant_ids)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Takes `quantity` out of stock; false when not enough is left.
pub async fn take_stock(conn: &mut PgConnection, product_id: Uuid, variant_id: Option<Uuid>, quantity: i32) -> Result<bool, sqlx::Error> {
    let result = match variant_id {
        Some(variant_id) => {
            sqlx::query("UPDATE product_variants SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
                .bind(variant_id)
                .bind(quantity)
                .execute(conn)
                .await?
        }
        None => {
            sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2")
                .bind(product_id)
                .bind(quantity)
                .execute(conn)
                .await?
        }
    };
    Ok(result.rows_affected() == 1)
}

/// Puts stock back after a cancellation. Deleted products are skipped.
pub async fn return_stock(conn: &mut PgConnection, product_id: Uuid, variant_id: Option<Uuid>, quantity: i32) -> Result<(), sqlx::Error> {
    match variant_id {
        Some(variant_id) => {
            sqlx::query("UPDATE product_variants SET stock = stock + $2 WHERE id = $1")
                .bind(variant_id)
                .bind(quantity)
                .execute(conn)
                .await?;
        }
        None => {
            sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
                .bind(product_id)
                .bind(quantity)
                .execute(conn)
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_filter_sql() {
        let filter = ProductFilter {
            category: Some(ProductCategory::Books),
            min_price: Some(Decimal::new(5, 0)),
            search: Some("  rust ".into()),
            in_stock: Some(true),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
        filter.push_where(&mut qb);
        let sql = qb.sql();
        assert!(sql.contains("p.status = 'APPROVED'"));
        assert!(sql.contains("p.category = $1"));
        assert!(sql.contains(">= $2"));
        assert!(sql.contains("p.name ILIKE $3 OR p.description ILIKE $4"));
        assert!(sql.contains("v.stock > 0"));
        assert!(!sql.contains("seller_id"));
    }

    #[test]
    fn test_blank_search_ignored() {
        let filter = ProductFilter { search: Some("   ".into()), ..Default::default() };
        let mut qb = QueryBuilder::<Postgres>::new("");
        filter.push_where(&mut qb);
        assert!(!qb.sql().contains("ILIKE"));
    }

    #[test]
    fn test_sort_parse() {
        let filter: ProductFilter = serde_json::from_value(serde_json::json!({"sort": "price_desc"})).unwrap();
        assert_eq!(filter.sort, SortOrder::PriceDesc);
        assert_eq!(ProductFilter::default().sort, SortOrder::Newest);
    }
}
