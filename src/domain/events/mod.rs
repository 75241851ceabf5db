//! Domain events published to NATS after the owning transaction commits.
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::{OrderStatus, ProductStatus};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, seller_id: Uuid },
    StatusChanged { product_id: Uuid, seller_id: Uuid, status: ProductStatus },
    Deleted { product_id: Uuid },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, checkout_id: Uuid, buyer_id: Uuid, seller_id: Uuid, total: Decimal },
    StatusChanged { order_id: Uuid, status: OrderStatus },
}

impl DomainEvent {
    /// NATS subject this event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::Created { .. }) => "marketplace.product.created",
            Self::Product(ProductEvent::StatusChanged { .. }) => "marketplace.product.status_changed",
            Self::Product(ProductEvent::Deleted { .. }) => "marketplace.product.deleted",
            Self::Order(OrderEvent::Placed { .. }) => "marketplace.order.placed",
            Self::Order(OrderEvent::StatusChanged { .. }) => "marketplace.order.status_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload() {
        let e = DomainEvent::Order(OrderEvent::StatusChanged { order_id: Uuid::nil(), status: OrderStatus::Shipped });
        assert_eq!(e.subject(), "marketplace.order.status_changed");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "order");
        assert_eq!(json["event"], "status_changed");
        assert_eq!(json["status"], "SHIPPED");
    }
}
