//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod customer;

pub use product::Product;
pub use order::{Order, OrderError, OrderItem, OrderStatus, PaymentStatus};
pub use cart::{Cart, CartError, CartLine, DELIVERY_FEE, FREE_DELIVERY_THRESHOLD, MAX_LINE_QUANTITY};
pub use customer::{AddressType, Customer, CustomerInfo};
