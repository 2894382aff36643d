//! Record store: products, customers, orders and site settings.
//!
//! The ordering flow only talks to [`RecordStore`]; [`PgStore`] backs it with
//! Postgres and [`MemoryStore`] keeps everything in process.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::aggregates::{Customer, CustomerInfo, Order, Product};
use crate::domain::value_objects::OrderNumber;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Backend(String),
}

/// Site-wide settings maintained from the dashboard.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    /// Serviceable pincodes separated by commas, spaces or newlines.
    pub serviceable_pincodes: String,
    pub support_phone: Option<String>,
}

impl SiteSettings {
    pub fn pincode_set(&self) -> HashSet<String> {
        self.serviceable_pincodes
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Active products ordered by sort position.
    async fn active_products(&self) -> Result<Vec<Product>, StoreError>;

    async fn settings(&self) -> Result<SiteSettings, StoreError>;

    /// Notification address of the dashboard user holding the admin role.
    async fn admin_email(&self) -> Result<Option<String>, StoreError>;

    async fn find_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>, StoreError>;

    /// Insert-or-overwrite keyed on phone number.
    async fn upsert_customer(&self, info: &CustomerInfo) -> Result<Customer, StoreError>;

    /// Fails with [`StoreError::Conflict`] if the order number is taken.
    async fn create_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn find_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, StoreError>;

    /// Newest first.
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Persists `status` and `payment_status` of an existing order.
    async fn save_order_status(&self, order: &Order) -> Result<(), StoreError>;
}
