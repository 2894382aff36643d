//! Cart Aggregate

use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::aggregates::order::OrderItem;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::Money;

/// Subtotal at or above which delivery is free.
pub const FREE_DELIVERY_THRESHOLD: i64 = 500;
/// Flat fee charged below the threshold.
pub const DELIVERY_FEE: i64 = 40;
/// Largest quantity a single line may hold.
pub const MAX_LINE_QUANTITY: u32 = 999;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

/// Snapshot of a product plus the quantity wanted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub name: String,
    pub price: Money,
    pub weight: String,
    pub image_url: Option<String>,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("product {0} is not available")]
    NotOrderable(i64),
    #[error("product {0} is not in the cart")]
    LineNotFound(i64),
    #[error("quantity must be between 1 and 999")]
    QuantityOutOfRange,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    /// Adds `quantity` of `product`, merging into an existing line. Non-positive quantities are ignored.
    pub fn add(&mut self, product: &Product, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 { return Ok(()); }
        if !product.is_orderable() { return Err(CartError::NotOrderable(product.id)); }
        let quantity = line_quantity(quantity)?;
        if let Some(existing) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            existing.quantity = line_quantity(i64::from(existing.quantity) + i64::from(quantity))?;
        } else {
            self.lines.push(CartLine {
                product_id: product.id,
                name: product.name.clone(),
                price: product.price,
                weight: product.weight.clone(),
                image_url: product.image_url.clone(),
                quantity,
            });
        }
        Ok(())
    }

    /// Sets the quantity of an existing line; zero or below removes it.
    pub fn set_quantity(&mut self, product_id: i64, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            self.remove(product_id);
            return Ok(());
        }
        let quantity = line_quantity(quantity)?;
        let line = self.lines.iter_mut().find(|l| l.product_id == product_id).ok_or(CartError::LineNotFound(product_id))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Returns whether a line was removed.
    pub fn remove(&mut self, product_id: i64) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) { self.lines.clear(); }

    pub fn subtotal(&self) -> Money { self.lines.iter().map(CartLine::line_total).sum() }

    pub fn delivery_fee(&self) -> Money {
        if self.subtotal() >= Money::rupees(FREE_DELIVERY_THRESHOLD) { Money::ZERO } else { Money::rupees(DELIVERY_FEE) }
    }

    pub fn total(&self) -> Money { self.subtotal() + self.delivery_fee() }

    pub fn item_count(&self) -> u64 { self.lines.iter().map(|l| u64::from(l.quantity)).sum() }

    /// Frozen copy of the lines for an order.
    pub fn snapshot(&self) -> Vec<OrderItem> {
        self.lines.iter().map(|l| OrderItem {
            id: l.product_id,
            name: l.name.clone(),
            quantity: l.quantity,
            price: l.price,
            weight: l.weight.clone(),
        }).collect()
    }
}

fn line_quantity(quantity: i64) -> Result<u32, CartError> {
    u32::try_from(quantity).ok().filter(|q| *q <= MAX_LINE_QUANTITY).ok_or(CartError::QuantityOutOfRange)
}
