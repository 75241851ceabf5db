//! Multi-vendor Marketplace API
//!
//! Sellers list products that an admin verifies before they go on sale.
//! Buyers browse the catalog, keep a cart and wishlist, and check out into
//! one order per seller.
//!
//! ## Features
//! - Accounts with buyer/seller roles assigned through an emailed code
//! - Product catalog with category specifications, variants and discounts
//! - Cart, per-seller checkout and order fulfilment
//! - Wishlist, address book and product reviews

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod extract;
pub mod routes;
pub mod services;
pub mod state;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use routes::router;
pub use state::AppState;
