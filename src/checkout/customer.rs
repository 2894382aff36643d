//! Returning-customer lookup and the checkout details form.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::aggregates::{Customer, CustomerInfo};
use crate::domain::value_objects::Phone;
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("phone number is locked to a returning customer, clear it to change")]
    PhoneLocked,
}

/// Checkout details form with returning-customer auto-fill.
///
/// Once a stored customer matches the phone number, the phone field is locked.
/// It unlocks when the value drops below ten digits.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CustomerForm {
    pub info: CustomerInfo,
    pub phone_locked: bool,
    pub returning_customer: bool,
}

/// What a phone edit asks the caller to do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhoneEdit {
    /// A complete number, look it up.
    Lookup(Phone),
    /// Unchanged locked number.
    Unchanged,
    Incomplete,
}

impl CustomerForm {
    pub fn edit_phone(&mut self, phone: &str) -> Result<PhoneEdit, FormError> {
        let phone = phone.trim();
        match Phone::parse(phone) {
            Ok(p) if self.phone_locked => {
                if p.as_str() == self.info.phone { Ok(PhoneEdit::Unchanged) } else { Err(FormError::PhoneLocked) }
            }
            Ok(p) => {
                self.info.phone = p.to_string();
                Ok(PhoneEdit::Lookup(p))
            }
            Err(_) => {
                self.info.phone = phone.to_string();
                self.phone_locked = false;
                self.returning_customer = false;
                Ok(PhoneEdit::Incomplete)
            }
        }
    }

    pub fn autofill(&mut self, customer: &Customer) {
        self.info.name = customer.name.clone();
        self.info.email = customer.email.clone();
        self.info.address = customer.address.clone();
        self.info.pincode = customer.pincode.clone();
        self.phone_locked = true;
        self.returning_customer = true;
    }

    /// Replaces the typed details, keeping a locked phone number.
    pub fn update(&mut self, mut info: CustomerInfo) {
        if self.phone_locked { info.phone = self.info.phone.clone(); }
        self.info = info;
    }
}

/// Finds returning customers and records customer details on every order.
#[derive(Clone)]
pub struct CustomerResolver {
    store: Arc<dyn RecordStore>,
}

impl CustomerResolver {
    pub fn new(store: Arc<dyn RecordStore>) -> Self { Self { store } }

    pub async fn find_by_phone(&self, phone: &Phone) -> Result<Option<Customer>, StoreError> {
        self.store.find_customer_by_phone(phone.as_str()).await
    }

    pub async fn upsert(&self, info: &CustomerInfo) -> Result<Customer, StoreError> {
        self.store.upsert_customer(info).await
    }

    /// Applies a phone keystroke to the form, auto-filling on a match.
    ///
    /// Lookup failures only cost the auto-fill; the form stays editable.
    pub async fn on_phone_input(&self, form: &mut CustomerForm, phone: &str) -> Result<Option<Customer>, FormError> {
        let PhoneEdit::Lookup(phone) = form.edit_phone(phone)? else { return Ok(None) };
        match self.find_by_phone(&phone).await {
            Ok(Some(customer)) => {
                debug!(phone = %phone, "Returning customer found");
                form.autofill(&customer);
                Ok(Some(customer))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(error = %e, "Customer lookup failed");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::customer::tests::info;
    use crate::store::MemoryStore;
    use crate::testing::FlakyStore;
    use std::sync::atomic::Ordering;

    async fn resolver_with_customer() -> (CustomerResolver, Arc<FlakyStore>) {
        let store = FlakyStore::new(MemoryStore::new());
        store.inner.upsert_customer(&info("9876543210")).await.unwrap();
        (CustomerResolver::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_lookup_only_on_ten_digits() {
        let (resolver, store) = resolver_with_customer().await;
        let mut form = CustomerForm::default();
        for typed in ["9", "98765", "987654321", "98765432101", "98765abcde"] {
            assert_eq!(resolver.on_phone_input(&mut form, typed).await.unwrap(), None);
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
        resolver.on_phone_input(&mut form, "9000000000").await.unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_returning_customer_autofills_and_locks() {
        let (resolver, store) = resolver_with_customer().await;
        let mut form = CustomerForm::default();
        let found = resolver.on_phone_input(&mut form, "9876543210").await.unwrap();
        assert!(found.is_some());
        assert!(form.phone_locked && form.returning_customer);
        assert_eq!(form.info.name, "Asha Rao");
        assert_eq!(form.info.address, "12 MG Road");
        assert_eq!(form.info.pincode, "110001");
        assert_eq!(form.info.email.as_deref(), Some("asha@example.com"));

        // locked: a different full number is refused, the same one is a no-op
        assert_eq!(resolver.on_phone_input(&mut form, "9000000000").await, Err(FormError::PhoneLocked));
        assert_eq!(form.edit_phone("9876543210"), Ok(PhoneEdit::Unchanged));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);

        // dropping below ten digits unlocks
        resolver.on_phone_input(&mut form, "987654321").await.unwrap();
        assert!(!form.phone_locked && !form.returning_customer);
        resolver.on_phone_input(&mut form, "9000000000").await.unwrap();
        assert_eq!(form.info.phone, "9000000000");
        assert!(!form.phone_locked);
    }

    #[tokio::test]
    async fn test_lookup_failure_leaves_form_editable() {
        let (resolver, store) = resolver_with_customer().await;
        store.fail_customers.store(true, Ordering::SeqCst);
        let mut form = CustomerForm::default();
        assert_eq!(resolver.on_phone_input(&mut form, "9876543210").await.unwrap(), None);
        assert!(!form.phone_locked);
    }

    #[test]
    fn test_update_keeps_locked_phone() {
        let mut form = CustomerForm::default();
        form.info.phone = "9876543210".into();
        form.phone_locked = true;
        form.update(info("9111111111"));
        assert_eq!(form.info.phone, "9876543210");
    }
}
