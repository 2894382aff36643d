//! Checkout: pincode checks, returning customers, the session state machine
//! and order placement.

mod customer;
mod debounce;
mod orchestrator;
mod pincode;
mod session;

pub use customer::{CustomerForm, CustomerResolver, FormError, PhoneEdit};
pub use debounce::{Debouncer, PincodeWatcher};
pub use orchestrator::{OrderNumberGenerator, OrderPlacement, PlaceOrderError, PlacedOrder};
pub use pincode::{PincodeCheck, PincodeValidator};
pub use session::{CartSummary, CheckoutSession, CheckoutStep, Confirmation, SessionError};
