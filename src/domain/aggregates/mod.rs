//! Aggregates module
pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod review;

pub use cart::{Cart, CartError, CartLine, LineProblem};
pub use order::{Actor, LineItem, OrderDraft, OrderError, OrderStatus, ShippingAddress};
pub use product::{ProductCategory, ProductError, ProductStatus, UnitPrice};
pub use review::RatingSummary;
