//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use crate::domain::aggregates::cart::Cart;
use crate::domain::aggregates::customer::CustomerInfo;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, OrderNumber};

/// Persisted order. Field names are the stored contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub order_number: OrderNumber,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    pub customer_address: String,
    pub customer_pincode: String,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub order_date: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem { pub id: i64, pub name: String, pub quantity: u32, pub price: Money, pub weight: String }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Preparing, OutForDelivery, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid }

impl OrderStatus {
    pub fn is_terminal(self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Forward one step along the delivery pipeline, or cancel from any live state.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Cancelled) => true,
            (Pending, Confirmed) | (Confirmed, Preparing) | (Preparing, OutForDelivery) | (OutForDelivery, Delivered) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "confirmed" => Self::Confirmed,
            "preparing" => Self::Preparing,
            "out_for_delivery" => Self::OutForDelivery,
            "delivered" => Self::Delivered,
            "cancelled" => Self::Cancelled,
            other => return Err(OrderError::UnknownStatus(other.to_string())),
        })
    }
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid" }
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

impl Order {
    /// Freezes the cart into a new pending order. The total is captured here, before the cart is cleared.
    pub fn place(order_number: OrderNumber, customer: &CustomerInfo, cart: &Cart) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoItems); }
        let total = cart.total();
        let mut order = Self {
            order_number: order_number.clone(),
            customer_name: customer.name.trim().to_string(),
            customer_phone: customer.phone.trim().to_string(),
            customer_email: customer.email().map(str::to_string),
            customer_address: customer.address.trim().to_string(),
            customer_pincode: customer.pincode.trim().to_string(),
            items: cart.snapshot(),
            total,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            order_date: Utc::now(),
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_number, total }));
        Ok(order)
    }

    /// Same order under a different number, used when the store reports a collision.
    pub fn renumber(&mut self, order_number: OrderNumber) {
        for e in &mut self.events {
            if let DomainEvent::Order(OrderEvent::Placed { order_number: n, .. }) = e { *n = order_number.clone(); }
        }
        self.order_number = order_number;
    }

    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = std::mem::replace(&mut self.status, next);
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_number: self.order_number.clone(), from, to: next }));
        Ok(())
    }

    pub fn mark_paid(&mut self) {
        if self.payment_status == PaymentStatus::Paid { return; }
        self.payment_status = PaymentStatus::Paid;
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentReceived { order_number: self.order_number.clone() }));
    }

    /// Payment only moves forward: a paid order cannot go back to pending.
    pub fn set_payment_status(&mut self, status: PaymentStatus) -> Result<(), OrderError> {
        match (self.payment_status, status) {
            (PaymentStatus::Paid, PaymentStatus::Pending) => Err(OrderError::PaymentReversal),
            (_, PaymentStatus::Paid) => {
                self.mark_paid();
                Ok(())
            }
            (PaymentStatus::Pending, PaymentStatus::Pending) => Ok(()),
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("unknown status: {0}")]
    UnknownStatus(String),
    #[error("payment already received, cannot mark the order unpaid")]
    PaymentReversal,
}
