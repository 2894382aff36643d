//! Doorstep Orders
//!
//! Cash-on-delivery ordering for a small home-delivery storefront.
//!
//! ## Features
//! - Product catalog with live refresh
//! - Cart with free-delivery threshold
//! - Pincode serviceability checks
//! - Returning-customer auto-fill by phone
//! - Order placement with operator and customer email notifications

pub mod api;
pub mod bus;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod notify;
pub mod store;

#[cfg(test)]
mod testing;

use thiserror::Error;

use checkout::{FormError, PlaceOrderError, SessionError};
use domain::aggregates::OrderError;
use store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Session not found")]
    SessionNotFound,

    #[error("Product not found")]
    ProductNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    PlaceOrder(#[from] PlaceOrderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
