//! Checkout Session

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::customer::CustomerForm;
use super::debounce::PincodeWatcher;
use crate::domain::aggregates::{Cart, CartError, CartLine, CustomerInfo, Product};
use crate::domain::value_objects::{Money, OrderNumber};
use crate::notify::NotificationReport;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep { #[default] Browsing, Checkout, AccountEntry, Placing, Confirmed }

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("cannot {action} while {step:?}")]
    WrongStep { action: &'static str, step: CheckoutStep },
    #[error(transparent)]
    Cart(#[from] CartError),
}

/// What the customer sees after a successful order.
#[derive(Clone, Debug, Serialize)]
pub struct Confirmation {
    pub customer: CustomerInfo,
    pub order_number: OrderNumber,
    pub total: Money,
    pub notifications: NotificationReport,
}

/// One shopper's cart and checkout progress.
pub struct CheckoutSession {
    id: Uuid,
    step: CheckoutStep,
    cart: Cart,
    pub form: CustomerForm,
    confirmation: Option<Confirmation>,
    pincode: Option<PincodeWatcher>,
}

impl Default for CheckoutSession {
    fn default() -> Self { Self::new() }
}

impl CheckoutSession {
    pub fn new() -> Self {
        Self { id: Uuid::now_v7(), step: CheckoutStep::Browsing, cart: Cart::new(), form: CustomerForm::default(), confirmation: None, pincode: None }
    }

    pub fn with_pincode_watcher(mut self, watcher: PincodeWatcher) -> Self {
        self.pincode = Some(watcher);
        self
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn step(&self) -> CheckoutStep { self.step }
    pub fn cart(&self) -> &Cart { &self.cart }
    pub fn confirmation(&self) -> Option<&Confirmation> { self.confirmation.as_ref() }
    pub fn pincode_watcher(&self) -> Option<&PincodeWatcher> { self.pincode.as_ref() }

    fn expect_step(&self, action: &'static str, allowed: &[CheckoutStep]) -> Result<(), SessionError> {
        if allowed.contains(&self.step) { Ok(()) } else { Err(SessionError::WrongStep { action, step: self.step }) }
    }

    /// Cart edits are refused mid-placement; after a confirmation they start a new round of shopping.
    fn editable_cart(&mut self) -> Result<&mut Cart, SessionError> {
        if self.step == CheckoutStep::Placing { return Err(SessionError::WrongStep { action: "edit the cart", step: self.step }); }
        if self.step == CheckoutStep::Confirmed {
            self.step = CheckoutStep::Browsing;
            self.confirmation = None;
        }
        Ok(&mut self.cart)
    }

    pub fn add_to_cart(&mut self, product: &Product, quantity: i64) -> Result<(), SessionError> {
        Ok(self.editable_cart()?.add(product, quantity)?)
    }

    pub fn set_quantity(&mut self, product_id: i64, quantity: i64) -> Result<(), SessionError> {
        Ok(self.editable_cart()?.set_quantity(product_id, quantity)?)
    }

    pub fn remove_from_cart(&mut self, product_id: i64) -> Result<bool, SessionError> {
        Ok(self.editable_cart()?.remove(product_id))
    }

    pub fn begin_checkout(&mut self) -> Result<(), SessionError> {
        self.expect_step("begin checkout", &[CheckoutStep::Browsing, CheckoutStep::Checkout, CheckoutStep::AccountEntry])?;
        if self.cart.is_empty() { return Err(SessionError::EmptyCart); }
        self.step = CheckoutStep::Checkout;
        Ok(())
    }

    pub fn enter_details(&mut self) -> Result<(), SessionError> {
        self.expect_step("enter details", &[CheckoutStep::Checkout, CheckoutStep::AccountEntry])?;
        if self.cart.is_empty() { return Err(SessionError::EmptyCart); }
        self.step = CheckoutStep::AccountEntry;
        Ok(())
    }

    pub fn back_to_browsing(&mut self) -> Result<(), SessionError> {
        self.expect_step("go back", &[CheckoutStep::Checkout, CheckoutStep::AccountEntry, CheckoutStep::Confirmed])?;
        self.step = CheckoutStep::Browsing;
        self.confirmation = None;
        Ok(())
    }

    /// Only allowed from `AccountEntry`; otherwise returns the current step.
    pub(crate) fn start_placing(&mut self) -> Result<(), CheckoutStep> {
        if self.step != CheckoutStep::AccountEntry { return Err(self.step); }
        self.step = CheckoutStep::Placing;
        Ok(())
    }

    pub(crate) fn placement_failed(&mut self) {
        if self.step == CheckoutStep::Placing { self.step = CheckoutStep::AccountEntry; }
    }

    /// Records the confirmation and empties the cart in one step.
    pub(crate) fn confirm(&mut self, confirmation: Confirmation) {
        self.form.update(confirmation.customer.clone());
        self.cart.clear();
        self.confirmation = Some(confirmation);
        self.step = CheckoutStep::Confirmed;
    }

    pub fn summary(&self) -> CartSummary { CartSummary::of(&self.cart) }
}

/// Cart lines plus derived totals.
#[derive(Clone, Debug, Serialize)]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    pub item_count: u64,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

impl CartSummary {
    pub fn of(cart: &Cart) -> Self {
        Self {
            lines: cart.lines().to_vec(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal().amount(),
            delivery_fee: cart.delivery_fee().amount(),
            total: cart.total().amount(),
        }
    }
}
