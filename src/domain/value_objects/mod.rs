//! Value Objects for the marketplace

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest accepted discount, in percent.
pub const MAX_DISCOUNT_PERCENT: i32 = 90;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 64 { return Err(SkuError::TooLong); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(SkuError::InvalidCharacter);
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SkuError { Empty, TooLong, InvalidCharacter }
impl std::error::Error for SkuError {}
impl fmt::Display for SkuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "SKU empty"),
            Self::TooLong => write!(f, "SKU too long"),
            Self::InvalidCharacter => write!(f, "SKU may only contain letters, digits, '-' and '_'"),
        }
    }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount - other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }
}

impl Default for Money { fn default() -> Self { Self::zero("USD") } }

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

/// `price × (100 − percent) / 100`, rounded half-up to two decimal places.
///
/// `percent` is clamped to `0..=MAX_DISCOUNT_PERCENT`.
pub fn discounted_price(price: Decimal, percent: i32) -> Decimal {
    let percent = percent.clamp(0, MAX_DISCOUNT_PERCENT);
    (price * Decimal::from(100 - percent) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Account role carried in access tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role { Buyer, Seller, Admin }

impl Role {
    /// Roles a user may claim for themselves through an emailed code.
    pub fn is_self_assignable(self) -> bool { matches!(self, Role::Buyer | Role::Seller) }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Buyer => write!(f, "buyer"), Self::Seller => write!(f, "seller"), Self::Admin => write!(f, "admin") }
    }
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    /// Converts a stock count read from the database; negatives read as zero.
    pub fn from_stock(value: i32) -> Self { Self(u32::try_from(value).unwrap_or(0)) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn covers(&self, requested: u32) -> bool { requested <= self.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sku() { let sku = Sku::new("prod-001").unwrap(); assert_eq!(sku.as_str(), "PROD-001"); }
    #[test]
    fn test_sku_rejects_spaces() { assert_eq!(Sku::new("a b"), Err(SkuError::InvalidCharacter)); }
    #[test]
    fn test_money_add() {
        let a = Money::new(Decimal::new(100, 0), "USD");
        let b = Money::new(Decimal::new(50, 0), "USD");
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert_eq!(a.add(&Money::zero("EUR")), Err(MoneyError::CurrencyMismatch));
    }
    #[test]
    fn test_discount_rounds_half_up() {
        // 19.99 * 0.85 = 16.9915
        assert_eq!(discounted_price(Decimal::new(1999, 2), 15), Decimal::new(1699, 2));
        // 0.05 * 0.5 = 0.025
        assert_eq!(discounted_price(Decimal::new(5, 2), 50), Decimal::new(3, 2));
        assert_eq!(discounted_price(Decimal::new(1000, 2), 0), Decimal::new(1000, 2));
    }
    #[test]
    fn test_discount_is_clamped() {
        assert_eq!(discounted_price(Decimal::new(100, 0), 95), Decimal::new(10, 0));
        assert_eq!(discounted_price(Decimal::new(100, 0), -5), Decimal::new(100, 0));
    }
    #[test]
    fn test_quantity() {
        let q = Quantity::from_stock(3);
        assert!(q.covers(3));
        assert!(!q.covers(4));
        assert_eq!(Quantity::from_stock(-2), Quantity::new(0));
    }
}
