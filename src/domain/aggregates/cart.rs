//! Cart Aggregate

use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::product::UnitPrice;
use crate::domain::value_objects::{Money, Quantity};

/// Largest quantity of a single line.
pub const MAX_LINE_QUANTITY: u32 = 100;

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    id: Option<Uuid>,
    buyer_id: Uuid,
    items: Vec<CartLine>,
    item_count: u32,
    subtotal: Money,
    discount_total: Money,
    total: Money,
}

/// A cart item joined with the product data needed to price and check it.
#[derive(Clone, Debug, Serialize)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub seller_id: Uuid,
    pub product_name: String,
    pub variant_name: Option<String>,
    #[serde(skip)]
    pub unit: UnitPrice,
    pub unit_price: Money,
    pub effective_unit_price: Money,
    pub discount_percent: i32,
    pub quantity: u32,
    pub available: Quantity,
    /// False once the product has left the APPROVED state.
    pub purchasable: bool,
}

impl CartLine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid, product_id: Uuid, variant_id: Option<Uuid>, seller_id: Uuid,
        product_name: String, variant_name: Option<String>, unit: UnitPrice,
        quantity: u32, available: Quantity, purchasable: bool, currency: &str,
    ) -> Self {
        Self {
            id, product_id, variant_id, seller_id, product_name, variant_name,
            unit_price: Money::new(unit.list, currency),
            effective_unit_price: Money::new(unit.effective, currency),
            discount_percent: unit.discount_percent,
            unit, quantity, available, purchasable,
        }
    }

    pub fn list_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
    pub fn line_total(&self) -> Money { self.effective_unit_price.multiply(self.quantity) }

    fn problem(&self) -> Option<LineProblem> {
        if !self.purchasable {
            return Some(LineProblem { item_id: self.id, product_id: self.product_id, reason: LineProblemReason::Unavailable, available: 0 });
        }
        if !self.available.covers(self.quantity) {
            return Some(LineProblem {
                item_id: self.id, product_id: self.product_id,
                reason: LineProblemReason::InsufficientStock, available: self.available.value(),
            });
        }
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineProblemReason { Unavailable, InsufficientStock }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LineProblem {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub reason: LineProblemReason,
    pub available: u32,
}

impl Cart {
    pub fn empty(buyer_id: Uuid, currency: &str) -> Self {
        Self {
            id: None, buyer_id, items: vec![], item_count: 0,
            subtotal: Money::zero(currency), discount_total: Money::zero(currency), total: Money::zero(currency),
        }
    }

    pub fn with_lines(id: Uuid, buyer_id: Uuid, items: Vec<CartLine>, currency: &str) -> Self {
        let mut cart = Self::empty(buyer_id, currency);
        cart.id = Some(id);
        cart.items = items;
        cart.recalculate();
        cart
    }

    pub fn id(&self) -> Option<Uuid> { self.id }
    pub fn items(&self) -> &[CartLine] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn discount_total(&self) -> &Money { &self.discount_total }
    pub fn total(&self) -> &Money { &self.total }
    pub fn item_count(&self) -> u32 { self.item_count }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn line(&self, item_id: Uuid) -> Option<&CartLine> { self.items.iter().find(|i| i.id == item_id) }

    /// Finds the line holding this product/variant pair.
    pub fn find_line(&self, product_id: Uuid, variant_id: Option<Uuid>) -> Option<&CartLine> {
        self.items.iter().find(|i| i.product_id == product_id && i.variant_id == variant_id)
    }

    /// Every line that cannot be bought right now.
    pub fn problems(&self) -> Vec<LineProblem> { self.items.iter().filter_map(CartLine::problem).collect() }

    pub fn ensure_checkout_ready(&self) -> Result<(), CartError> {
        if self.is_empty() { return Err(CartError::Empty); }
        let problems = self.problems();
        if problems.is_empty() { Ok(()) } else { Err(CartError::Unavailable(problems)) }
    }

    fn recalculate(&mut self) {
        let currency = self.subtotal.currency().to_string();
        self.subtotal = self.items.iter().fold(Money::zero(&currency), |acc, i| acc.add(&i.list_total()).unwrap_or(acc));
        self.total = self.items.iter().fold(Money::zero(&currency), |acc, i| acc.add(&i.line_total()).unwrap_or(acc));
        self.discount_total = self.subtotal.subtract(&self.total).unwrap_or_else(|_| Money::zero(&currency));
        self.item_count = self.items.iter().map(|i| i.quantity).sum();
    }
}

/// Quantity a line will hold after adding `adding` to what is already there.
pub fn merged_quantity(existing: Option<u32>, adding: u32, available: Quantity) -> Result<u32, CartError> {
    let quantity = existing.unwrap_or(0).saturating_add(adding);
    if quantity > MAX_LINE_QUANTITY { return Err(CartError::QuantityLimit); }
    if !available.covers(quantity) { return Err(CartError::InsufficientStock { available: available.value() }); }
    Ok(quantity)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartError { Empty, QuantityLimit, InsufficientStock { available: u32 }, Unavailable(Vec<LineProblem>) }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Cart is empty"),
            Self::QuantityLimit => write!(f, "At most {MAX_LINE_QUANTITY} units per item"),
            Self::InsufficientStock { available } => write!(f, "Insufficient stock: {available} available"),
            Self::Unavailable(p) => write!(f, "{} cart item(s) cannot be purchased", p.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(price: i64, discount: i32, qty: u32, stock: i32) -> CartLine {
        CartLine::new(
            Uuid::new_v4(), Uuid::new_v4(), None, Uuid::new_v4(), "Widget".into(), None,
            UnitPrice::resolve(Decimal::new(price, 0), None, discount), qty, Quantity::from_stock(stock), true, "USD",
        )
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::with_lines(Uuid::new_v4(), Uuid::new_v4(), vec![line(10, 0, 2, 5), line(40, 25, 1, 5)], "USD");
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal().amount(), Decimal::new(60, 0));
        assert_eq!(cart.total().amount(), Decimal::new(50, 0));
        assert_eq!(cart.discount_total().amount(), Decimal::new(10, 0));
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::empty(Uuid::new_v4(), "USD");
        assert!(cart.id().is_none());
        assert_eq!(cart.ensure_checkout_ready(), Err(CartError::Empty));
        assert_eq!(cart.total().amount(), Decimal::ZERO);
    }

    #[test]
    fn test_merged_quantity() {
        assert_eq!(merged_quantity(None, 2, Quantity::new(5)), Ok(2));
        assert_eq!(merged_quantity(Some(3), 2, Quantity::new(5)), Ok(5)); // Merged
        assert_eq!(merged_quantity(Some(3), 3, Quantity::new(5)), Err(CartError::InsufficientStock { available: 5 }));
        assert_eq!(merged_quantity(Some(99), 2, Quantity::new(500)), Err(CartError::QuantityLimit));
    }

    #[test]
    fn test_checkout_reports_every_problem() {
        let short = line(10, 0, 4, 3);
        let mut gone = line(10, 0, 1, 3);
        gone.purchasable = false;
        let fine = line(10, 0, 1, 3);
        let (short_id, gone_id) = (short.id, gone.id);
        let cart = Cart::with_lines(Uuid::new_v4(), Uuid::new_v4(), vec![short, gone, fine], "USD");
        match cart.ensure_checkout_ready() {
            Err(CartError::Unavailable(problems)) => {
                assert_eq!(problems.len(), 2);
                assert_eq!(problems[0].item_id, short_id);
                assert_eq!(problems[0].reason, LineProblemReason::InsufficientStock);
                assert_eq!(problems[0].available, 3);
                assert_eq!(problems[1].item_id, gone_id);
                assert_eq!(problems[1].reason, LineProblemReason::Unavailable);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
