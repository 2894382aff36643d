//! In-memory record store

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{RecordStore, SiteSettings, StoreError};
use crate::domain::aggregates::{Customer, CustomerInfo, Order, Product};
use crate::domain::value_objects::OrderNumber;

/// Process-local store used when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    products: RwLock<Vec<Product>>,
    settings: RwLock<SiteSettings>,
    admin_email: RwLock<Option<String>>,
    customers: RwLock<HashMap<String, Customer>>,
    orders: RwLock<Vec<Order>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_products(self, products: Vec<Product>) -> Self {
        Self { products: RwLock::new(products), ..self }
    }

    pub fn with_settings(self, settings: SiteSettings) -> Self {
        Self { settings: RwLock::new(settings), ..self }
    }

    pub fn with_admin_email(self, email: impl Into<String>) -> Self {
        Self { admin_email: RwLock::new(Some(email.into())), ..self }
    }

    pub async fn replace_products(&self, products: Vec<Product>) { *self.products.write().await = products; }

    pub async fn customer_count(&self) -> usize { self.customers.read().await.len() }

    pub async fn order_count(&self) -> usize { self.orders.read().await.len() }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn active_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<_> = self.products.read().await.iter().filter(|p| p.is_active).cloned().collect();
        products.sort_by_key(|p| (p.sort_order, p.id));
        Ok(products)
    }

    async fn settings(&self) -> Result<SiteSettings, StoreError> { Ok(self.settings.read().await.clone()) }

    async fn admin_email(&self) -> Result<Option<String>, StoreError> { Ok(self.admin_email.read().await.clone()) }

    async fn find_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.read().await.get(phone).cloned())
    }

    async fn upsert_customer(&self, info: &CustomerInfo) -> Result<Customer, StoreError> {
        let mut customers = self.customers.write().await;
        let customer = customers
            .entry(info.phone.clone())
            .and_modify(|c| c.apply(info))
            .or_insert_with(|| Customer::from_info(info));
        Ok(customer.clone())
    }

    async fn create_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        if orders.iter().any(|o| o.order_number == order.order_number) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.order_number)));
        }
        let mut stored = order.clone();
        stored.take_events();
        orders.push(stored);
        Ok(())
    }

    async fn find_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().await.iter().find(|o| &o.order_number == order_number).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let mut orders = self.orders.read().await.clone();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }

    async fn save_order_status(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        let stored = orders
            .iter_mut()
            .find(|o| o.order_number == order.order_number)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", order.order_number)))?;
        stored.status = order.status;
        stored.payment_status = order.payment_status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::customer::tests::info;
    use crate::domain::aggregates::product::sample;
    use crate::domain::aggregates::Cart;

    #[tokio::test]
    async fn test_upsert_keys_on_phone() {
        let store = MemoryStore::new();
        store.upsert_customer(&info("9876543210")).await.unwrap();
        let mut again = info("9876543210");
        again.address = "New flat".into();
        let c = store.upsert_customer(&again).await.unwrap();
        assert_eq!(c.address, "New flat");
        assert_eq!(store.customer_count().await, 1);
        store.upsert_customer(&info("9000000000")).await.unwrap();
        assert_eq!(store.customer_count().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_order_number_conflicts() {
        let store = MemoryStore::new();
        let mut cart = Cart::new();
        cart.add(&sample(1, 100), 1).unwrap();
        let order = Order::place(OrderNumber::from_millis(5), &info("9876543210"), &cart).unwrap();
        store.create_order(&order).await.unwrap();
        assert!(matches!(store.create_order(&order).await, Err(StoreError::Conflict(_))));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_inactive_products_hidden() {
        let mut hidden = sample(2, 10);
        hidden.is_active = false;
        let store = MemoryStore::new().with_products(vec![sample(3, 10), hidden, sample(1, 10)]);
        let ids: Vec<_> = store.active_products().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, [1, 3]);
    }
}
