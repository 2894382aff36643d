//! Product record, read-only to the ordering flow

use serde::{Deserialize, Serialize};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Money,
    /// Package weight label, e.g. "500g".
    pub weight: String,
    pub image_url: Option<String>,
    pub stock: u32,
    pub is_bestseller: bool,
    pub is_new: bool,
    pub is_active: bool,
    pub description: String,
    pub sort_order: i32,
}

impl Product {
    pub fn is_in_stock(&self) -> bool { self.stock > 0 }

    /// Active and in stock.
    pub fn is_orderable(&self) -> bool { self.is_active && self.is_in_stock() }
}

#[cfg(test)]
pub(crate) fn sample(id: i64, price: i64) -> Product {
    Product {
        id,
        name: format!("Product {id}"),
        price: Money::rupees(price),
        weight: "500g".into(),
        image_url: None,
        stock: 10,
        is_bestseller: false,
        is_new: false,
        is_active: true,
        description: String::new(),
        sort_order: i32::try_from(id).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_stock_not_orderable() {
        let mut p = sample(1, 100);
        assert!(p.is_orderable());
        p.stock = 0;
        assert!(!p.is_orderable());
        p.stock = 3;
        p.is_active = false;
        assert!(!p.is_orderable());
    }
}
