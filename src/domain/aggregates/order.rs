//! Order Aggregate
//!
//! A checkout becomes one order per seller. Each order snapshots the unit
//! prices and the shipping address at the time it was placed.

use std::collections::BTreeMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::cart::CartLine;
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus { #[default] Placed, Shipped, Delivered, Cancelled }

/// Who is asking for a status change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor { Buyer, Seller }

impl OrderStatus {
    pub fn transition(self, to: OrderStatus, actor: Actor) -> Result<OrderStatus, OrderError> {
        use OrderStatus::*;
        let allowed = match actor {
            Actor::Seller => matches!((self, to), (Placed, Shipped) | (Shipped, Delivered) | (Placed, Cancelled)),
            Actor::Buyer => matches!((self, to), (Placed, Cancelled)),
        };
        if allowed { Ok(to) } else { Err(OrderError::InvalidTransition { from: self, to }) }
    }
}

/// Address copied onto the order when it is placed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub unit_price: Decimal,
    pub discount_percent: i32,
    pub quantity: u32,
    pub line_total: Decimal,
}

/// An order for one seller, ready to be inserted.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub discount_total: Money,
    pub total: Money,
}

impl OrderDraft {
    fn new(seller_id: Uuid, currency: &str) -> Self {
        Self {
            id: Uuid::now_v7(), seller_id, items: vec![],
            subtotal: Money::zero(currency), discount_total: Money::zero(currency), total: Money::zero(currency),
        }
    }

    fn push(&mut self, line: &CartLine) {
        let list = line.list_total();
        let total = line.line_total();
        self.items.push(LineItem {
            product_id: line.product_id,
            variant_id: line.variant_id,
            product_name: line.product_name.clone(),
            variant_name: line.variant_name.clone(),
            unit_price: line.unit.effective,
            discount_percent: line.discount_percent,
            quantity: line.quantity,
            line_total: total.amount(),
        });
        self.subtotal = self.subtotal.add(&list).unwrap_or(self.subtotal.clone());
        self.total = self.total.add(&total).unwrap_or(self.total.clone());
        self.discount_total = self.subtotal.subtract(&self.total).unwrap_or(self.discount_total.clone());
    }
}

/// Groups purchasable lines by seller, one draft per seller, ordered by seller id.
pub fn split_by_seller(lines: &[CartLine], currency: &str) -> Result<Vec<OrderDraft>, OrderError> {
    if lines.is_empty() { return Err(OrderError::NoItems); }
    let mut by_seller: BTreeMap<Uuid, OrderDraft> = BTreeMap::new();
    for line in lines {
        by_seller.entry(line.seller_id).or_insert_with(|| OrderDraft::new(line.seller_id, currency)).push(line);
    }
    Ok(by_seller.into_values().collect())
}

/// Sum of every draft's total.
pub fn grand_total(drafts: &[OrderDraft], currency: &str) -> Money {
    drafts.iter().fold(Money::zero(currency), |acc, d| acc.add(&d.total).unwrap_or(acc))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError { NoItems, InvalidTransition { from: OrderStatus, to: OrderStatus } }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "No items"),
            Self::InvalidTransition { from, to } => write!(f, "Cannot move order from {from:?} to {to:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::UnitPrice;
    use crate::domain::value_objects::Quantity;

    fn line(seller: Uuid, price: i64, discount: i32, qty: u32) -> CartLine {
        CartLine::new(
            Uuid::new_v4(), Uuid::new_v4(), None, seller, "Widget".into(), None,
            UnitPrice::resolve(Decimal::new(price, 0), None, discount), qty, Quantity::new(100), true, "USD",
        )
    }

    #[test]
    fn test_split_per_seller() {
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let lines = vec![line(b, 10, 0, 1), line(a, 20, 50, 2), line(b, 5, 0, 4)];
        let drafts = split_by_seller(&lines, "USD").unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].seller_id, a);
        assert_eq!(drafts[0].total.amount(), Decimal::new(20, 0));
        assert_eq!(drafts[0].subtotal.amount(), Decimal::new(40, 0));
        assert_eq!(drafts[0].discount_total.amount(), Decimal::new(20, 0));
        assert_eq!(drafts[1].seller_id, b);
        assert_eq!(drafts[1].items.len(), 2);
        assert_eq!(drafts[1].total.amount(), Decimal::new(30, 0));
        assert_eq!(grand_total(&drafts, "USD").amount(), Decimal::new(50, 0));
        assert_ne!(drafts[0].id, drafts[1].id);
    }

    #[test]
    fn test_split_requires_lines() {
        assert!(matches!(split_by_seller(&[], "USD"), Err(OrderError::NoItems)));
    }

    #[test]
    fn test_order_workflow() {
        let status = OrderStatus::Placed.transition(OrderStatus::Shipped, Actor::Seller).unwrap();
        let status = status.transition(OrderStatus::Delivered, Actor::Seller).unwrap();
        assert_eq!(status, OrderStatus::Delivered);
        assert!(status.transition(OrderStatus::Cancelled, Actor::Seller).is_err());
        assert!(OrderStatus::Shipped.transition(OrderStatus::Cancelled, Actor::Buyer).is_err());
        assert!(OrderStatus::Placed.transition(OrderStatus::Shipped, Actor::Buyer).is_err());
        assert_eq!(OrderStatus::Placed.transition(OrderStatus::Cancelled, Actor::Buyer), Ok(OrderStatus::Cancelled));
    }
}
