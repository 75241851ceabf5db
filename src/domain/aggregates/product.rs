//! Product Aggregate
//!
//! Category-specific specification rules, the admin verification workflow
//! and effective (discounted) pricing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::domain::value_objects::discounted_price;

/// Maximum number of keys in a product's specification object.
pub const MAX_SPECIFICATION_KEYS: usize = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "product_category", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductCategory { Electronics, Fashion, Books, Home, Beauty, Sports, Grocery, Other }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "product_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus { #[default] Pending, Approved, Rejected }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecKind { Text, Number }

impl ProductCategory {
    /// Keys every product in this category must describe.
    pub fn required_specifications(self) -> &'static [(&'static str, SpecKind)] {
        use SpecKind::{Number, Text};
        match self {
            Self::Electronics => &[("brand", Text), ("model", Text), ("warranty_months", Number)],
            Self::Fashion => &[("brand", Text), ("size", Text), ("material", Text), ("color", Text)],
            Self::Books => &[("author", Text), ("publisher", Text), ("isbn", Text), ("pages", Number)],
            Self::Home => &[("material", Text), ("dimensions", Text)],
            Self::Beauty => &[("brand", Text), ("volume_ml", Number)],
            Self::Sports => &[("brand", Text), ("sport", Text)],
            Self::Grocery => &[("weight_grams", Number), ("expiry_days", Number)],
            Self::Other => &[],
        }
    }
}

/// Checks a specification object against the category's required keys.
///
/// Values may be strings, numbers or booleans; extra keys are allowed.
pub fn validate_specifications(category: ProductCategory, specs: &Value) -> Result<(), ProductError> {
    let map: &Map<String, Value> = specs.as_object().ok_or(ProductError::SpecificationsNotObject)?;
    if map.len() > MAX_SPECIFICATION_KEYS { return Err(ProductError::TooManySpecifications); }
    for (key, value) in map {
        let scalar = match value {
            Value::String(s) => !s.trim().is_empty(),
            Value::Number(_) | Value::Bool(_) => true,
            _ => false,
        };
        if !scalar { return Err(ProductError::InvalidSpecification(key.clone())); }
    }
    for (key, kind) in category.required_specifications() {
        match (map.get(*key), kind) {
            (None, _) => return Err(ProductError::MissingSpecification((*key).to_string())),
            (Some(Value::String(_)), SpecKind::Text) => {}
            (Some(Value::Number(n)), SpecKind::Number) if n.as_f64().is_some_and(|v| v >= 0.0) => {}
            (Some(_), _) => return Err(ProductError::InvalidSpecification((*key).to_string())),
        }
    }
    Ok(())
}

/// Admin verification decision.
pub fn review_transition(requested: ProductStatus, reason: Option<&str>) -> Result<Option<String>, ProductError> {
    match requested {
        ProductStatus::Pending => Err(ProductError::CannotResetToPending),
        ProductStatus::Approved => Ok(None),
        ProductStatus::Rejected => match reason.map(str::trim) {
            Some(r) if !r.is_empty() => Ok(Some(r.to_string())),
            _ => Err(ProductError::RejectionReasonRequired),
        },
    }
}

/// Unit price of a product or one of its variants, before and after discount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitPrice { pub list: Decimal, pub effective: Decimal, pub discount_percent: i32 }

impl UnitPrice {
    pub fn resolve(product_price: Decimal, variant_price: Option<Decimal>, discount_percent: i32) -> Self {
        let list = variant_price.unwrap_or(product_price);
        Self { list, effective: discounted_price(list, discount_percent), discount_percent }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    SpecificationsNotObject,
    TooManySpecifications,
    MissingSpecification(String),
    InvalidSpecification(String),
    CannotResetToPending,
    RejectionReasonRequired,
}

impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpecificationsNotObject => write!(f, "specifications must be a JSON object"),
            Self::TooManySpecifications => write!(f, "at most {MAX_SPECIFICATION_KEYS} specification keys are allowed"),
            Self::MissingSpecification(k) => write!(f, "missing required specification '{k}'"),
            Self::InvalidSpecification(k) => write!(f, "invalid value for specification '{k}'"),
            Self::CannotResetToPending => write!(f, "status can only be set to APPROVED or REJECTED"),
            Self::RejectionReasonRequired => write!(f, "a reason is required when rejecting a product"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_electronics_specs() {
        let ok = json!({"brand": "Acme", "model": "X1", "warranty_months": 12, "color": "black"});
        assert!(validate_specifications(ProductCategory::Electronics, &ok).is_ok());
        let missing = json!({"brand": "Acme", "model": "X1"});
        assert_eq!(
            validate_specifications(ProductCategory::Electronics, &missing),
            Err(ProductError::MissingSpecification("warranty_months".into()))
        );
        let wrong_kind = json!({"brand": "Acme", "model": "X1", "warranty_months": "twelve"});
        assert_eq!(
            validate_specifications(ProductCategory::Electronics, &wrong_kind),
            Err(ProductError::InvalidSpecification("warranty_months".into()))
        );
    }

    #[test]
    fn test_specs_must_be_flat_object() {
        assert_eq!(validate_specifications(ProductCategory::Other, &json!([1])), Err(ProductError::SpecificationsNotObject));
        assert_eq!(
            validate_specifications(ProductCategory::Other, &json!({"nested": {"a": 1}})),
            Err(ProductError::InvalidSpecification("nested".into()))
        );
        assert_eq!(
            validate_specifications(ProductCategory::Other, &json!({"blank": "  "})),
            Err(ProductError::InvalidSpecification("blank".into()))
        );
        assert!(validate_specifications(ProductCategory::Other, &json!({})).is_ok());
    }

    #[test]
    fn test_review_transition() {
        assert_eq!(review_transition(ProductStatus::Approved, None), Ok(None));
        assert_eq!(review_transition(ProductStatus::Rejected, Some(" blurry photos ")), Ok(Some("blurry photos".into())));
        assert_eq!(review_transition(ProductStatus::Rejected, Some("")), Err(ProductError::RejectionReasonRequired));
        assert_eq!(review_transition(ProductStatus::Pending, None), Err(ProductError::CannotResetToPending));
    }

    #[test]
    fn test_variant_price_overrides_before_discount() {
        let p = UnitPrice::resolve(Decimal::new(100, 0), Some(Decimal::new(80, 0)), 25);
        assert_eq!(p.list, Decimal::new(80, 0));
        assert_eq!(p.effective, Decimal::new(60, 0));
        let p = UnitPrice::resolve(Decimal::new(100, 0), None, 10);
        assert_eq!(p.effective, Decimal::new(90, 0));
    }
}
