//! Database access for the marketplace `PostgreSQL` schema.
//!
//! Each module owns the rows and queries of one table family. Functions take
//! an executor so the same query runs on the pool or inside a transaction.
//!
//! Migrations live in `migrations/` and are applied at startup.

pub mod addresses;
pub mod carts;
pub mod orders;
pub mod otps;
pub mod password_resets;
pub mod products;
pub mod reviews;
pub mod users;
pub mod wishlist;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
}

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// `page`/`per_page` query parameters, clamped to sane bounds.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn page(&self) -> u32 { self.page.unwrap_or(1).max(1) }
    pub fn per_page(&self) -> u32 { self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE) }
    pub fn limit(&self) -> i64 { i64::from(self.per_page()) }
    pub fn offset(&self) -> i64 { i64::from(self.page() - 1) * self.limit() }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, params: PageParams) -> Self {
        Self { data, total, page: params.page(), per_page: params.per_page() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params() {
        let p = PageParams::default();
        assert_eq!((p.page(), p.per_page(), p.offset()), (1, 20, 0));
        let p = PageParams { page: Some(3), per_page: Some(500) };
        assert_eq!((p.per_page(), p.offset()), (100, 200));
        let p = PageParams { page: Some(0), per_page: Some(0) };
        assert_eq!((p.page(), p.per_page(), p.offset()), (1, 1, 0));
    }
}
