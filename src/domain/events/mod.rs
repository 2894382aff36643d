//! Domain events
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::{Money, OrderNumber};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Catalog(CatalogEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_number: OrderNumber, total: Money },
    StatusChanged { order_number: OrderNumber, from: OrderStatus, to: OrderStatus },
    PaymentReceived { order_number: OrderNumber },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogEvent {
    /// The active product list was reloaded.
    Updated { product_count: usize },
}
