//! Test doubles shared by the module tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::domain::aggregates::{Customer, CustomerInfo, Order, Product};
use crate::domain::value_objects::OrderNumber;
use crate::notify::{EmailError, EmailSender, EmailTemplate, TemplateParams};
use crate::store::{MemoryStore, RecordStore, SiteSettings, StoreError};

/// Wraps a [`MemoryStore`] with switchable failures and call counters.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_settings: AtomicBool,
    pub fail_customers: AtomicBool,
    pub fail_orders: AtomicBool,
    /// Number of upcoming `create_order` calls that report a conflict.
    pub order_conflicts: AtomicUsize,
    pub settings_calls: AtomicUsize,
    pub lookups: AtomicUsize,
    pub upserts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Arc<Self> { Arc::new(Self { inner, ..Default::default() }) }

    fn fail(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) { Err(StoreError::Backend(format!("{what} unavailable"))) } else { Ok(()) }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn active_products(&self) -> Result<Vec<Product>, StoreError> { self.inner.active_products().await }

    async fn settings(&self) -> Result<SiteSettings, StoreError> {
        self.settings_calls.fetch_add(1, Ordering::SeqCst);
        Self::fail(&self.fail_settings, "settings")?;
        self.inner.settings().await
    }

    async fn admin_email(&self) -> Result<Option<String>, StoreError> { self.inner.admin_email().await }

    async fn find_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Self::fail(&self.fail_customers, "customers")?;
        self.inner.find_customer_by_phone(phone).await
    }

    async fn upsert_customer(&self, info: &CustomerInfo) -> Result<Customer, StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Self::fail(&self.fail_customers, "customers")?;
        self.inner.upsert_customer(info).await
    }

    async fn create_order(&self, order: &Order) -> Result<(), StoreError> {
        Self::fail(&self.fail_orders, "orders")?;
        let pending = self.order_conflicts.load(Ordering::SeqCst);
        if pending > 0 {
            self.order_conflicts.store(pending - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict(format!("order {} already exists", order.order_number)));
        }
        self.inner.create_order(order).await
    }

    async fn find_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, StoreError> { self.inner.find_order(order_number).await }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> { self.inner.list_orders().await }

    async fn save_order_status(&self, order: &Order) -> Result<(), StoreError> { self.inner.save_order_status(order).await }
}

/// Records every send; can fail a template or hold sends until released.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(EmailTemplate, String, TemplateParams)>>,
    failing: Mutex<Vec<EmailTemplate>>,
    gate: Option<Semaphore>,
    attempts: AtomicUsize,
}

impl RecordingSender {
    pub fn failing_for(template: EmailTemplate) -> Self {
        Self { failing: Mutex::new(vec![template]), ..Default::default() }
    }

    pub fn failing_all() -> Self {
        Self { failing: Mutex::new(vec![EmailTemplate::OperatorAlert, EmailTemplate::CustomerConfirmation]), ..Default::default() }
    }

    pub fn gated() -> Self { Self { gate: Some(Semaphore::new(0)), ..Default::default() } }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate { gate.add_permits(permits); }
    }

    pub fn attempts(&self) -> usize { self.attempts.load(Ordering::SeqCst) }

    pub fn sent(&self) -> Vec<(EmailTemplate, String, TemplateParams)> { self.sent.lock().unwrap().clone() }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, template: EmailTemplate, recipient: &str, params: &TemplateParams) -> Result<(), EmailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|e| EmailError::Other(e.to_string()))?;
        }
        if self.failing.lock().unwrap().contains(&template) {
            return Err(EmailError::Other("mailbox unreachable".into()));
        }
        self.sent.lock().unwrap().push((template, recipient.to_string(), params.clone()));
        Ok(())
    }
}
