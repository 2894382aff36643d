//! Order placement: validate, save the customer, persist the order, notify.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use super::customer::CustomerResolver;
use super::pincode::{PincodeCheck, PincodeValidator};
use super::session::{CheckoutSession, CheckoutStep, Confirmation};
use crate::bus::EventBus;
use crate::domain::aggregates::{CustomerInfo, Order, OrderError};
use crate::domain::value_objects::{Money, OrderNumber};
use crate::notify::{NotificationDispatcher, NotificationReport};
use crate::store::{RecordStore, StoreError};

/// Attempts at persisting an order before giving up on number collisions.
const MAX_NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// Field name to message.
    #[error("please correct the highlighted fields")]
    Validation(BTreeMap<String, String>),
    #[error("your cart is empty")]
    EmptyCart,
    #[error("cannot place an order while {0:?}")]
    WrongStep(CheckoutStep),
    #[error("could not save your details: {0}")]
    Customer(StoreError),
    #[error("could not place your order: {0}")]
    Persistence(StoreError),
}


/// Issues `EB` order numbers from the millisecond clock, never repeating a millisecond.
#[derive(Debug, Default)]
pub struct OrderNumberGenerator {
    last: AtomicU64,
}

impl OrderNumberGenerator {
    pub fn new() -> Self { Self::default() }

    pub fn next(&self) -> OrderNumber {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let previous = match self.last.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(now.max(prev + 1))) {
            Ok(prev) | Err(prev) => prev,
        };
        OrderNumber::from_millis(now.max(previous + 1))
    }
}

/// Successful placement, mirrored into the session confirmation.
#[derive(Clone, Debug)]
pub struct PlacedOrder {
    pub order_number: OrderNumber,
    pub total: Money,
    pub notifications: NotificationReport,
}

/// Drives a checkout session from validated details to a stored order.
///
/// Side effects run strictly in this order: customer upsert, order insert,
/// notifications, cart clear. Only the first two can fail the placement.
pub struct OrderPlacement {
    store: Arc<dyn RecordStore>,
    pincodes: Arc<PincodeValidator>,
    customers: CustomerResolver,
    notifier: Arc<NotificationDispatcher>,
    numbers: OrderNumberGenerator,
    events: EventBus,
}

impl OrderPlacement {
    pub fn new(store: Arc<dyn RecordStore>, pincodes: Arc<PincodeValidator>, notifier: Arc<NotificationDispatcher>, events: EventBus) -> Self {
        let customers = CustomerResolver::new(store.clone());
        Self { store, pincodes, customers, notifier, numbers: OrderNumberGenerator::new(), events }
    }

    pub fn customers(&self) -> &CustomerResolver { &self.customers }

    #[instrument(skip_all, fields(session = %session.id()))]
    pub async fn place_order(&self, session: &mut CheckoutSession, info: CustomerInfo) -> Result<PlacedOrder, PlaceOrderError> {
        session.start_placing().map_err(PlaceOrderError::WrongStep)?;
        match self.run(session, info).await {
            Ok(placed) => Ok(placed),
            Err(e) => {
                session.placement_failed();
                Err(e)
            }
        }
    }

    async fn run(&self, session: &mut CheckoutSession, info: CustomerInfo) -> Result<PlacedOrder, PlaceOrderError> {
        let mut info = info.normalized();
        if session.form.phone_locked { info.phone = session.form.info.phone.clone(); }
        session.form.update(info.clone());

        self.validate(&info).await?;
        if session.cart().is_empty() { return Err(PlaceOrderError::EmptyCart); }

        let number = self.numbers.next();

        self.customers.upsert(&info).await.map_err(|e| {
            error!(error = %e, "Customer upsert failed, order not placed");
            PlaceOrderError::Customer(e)
        })?;

        let mut order = Order::place(number, &info, session.cart()).map_err(|e| match e {
            OrderError::NoItems => PlaceOrderError::EmptyCart,
            other => PlaceOrderError::Validation(BTreeMap::from([("order".to_string(), other.to_string())])),
        })?;
        self.persist(&mut order).await?;
        info!(order_number = %order.order_number, total = %order.total, "Order placed");

        self.events.publish(order.take_events()).await;
        let notifications = self.notifier.notify_order_placed(&order, &info).await;

        let placed = PlacedOrder { order_number: order.order_number.clone(), total: order.total, notifications };
        session.confirm(Confirmation {
            customer: info,
            order_number: placed.order_number.clone(),
            total: placed.total,
            notifications: placed.notifications.clone(),
        });
        Ok(placed)
    }

    /// Field checks first, then serviceability of a well-formed pincode.
    async fn validate(&self, info: &CustomerInfo) -> Result<(), PlaceOrderError> {
        let mut errors = info.field_errors();
        if !errors.contains_key("pincode") {
            if let Some(local) = PincodeCheck::local(&info.pincode) {
                errors.insert("pincode".into(), local.message);
            } else {
                let check = self.pincodes.validate(&info.pincode).await;
                if !check.is_serviceable { errors.insert("pincode".into(), check.message); }
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(PlaceOrderError::Validation(errors)) }
    }

    async fn persist(&self, order: &mut Order) -> Result<(), PlaceOrderError> {
        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            match self.store.create_order(order).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Conflict(msg)) if attempt < MAX_NUMBER_ATTEMPTS => {
                    warn!(order_number = %order.order_number, attempt, %msg, "Order number taken, retrying");
                    order.renumber(self.numbers.next());
                }
                Err(e) => {
                    error!(order_number = %order.order_number, error = %e, "Order persistence failed");
                    return Err(PlaceOrderError::Persistence(e));
                }
            }
        }
        Err(PlaceOrderError::Persistence(StoreError::Conflict("no free order number".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::customer::tests::info;
    use crate::domain::aggregates::product::sample;
    use crate::domain::aggregates::{OrderStatus, PaymentStatus};
    use crate::notify::{DeliveryOutcome, EmailSender, MessageContext};
    use crate::store::{MemoryStore, SiteSettings};
    use crate::testing::{FlakyStore, RecordingSender};
    use std::collections::HashSet;
    use std::time::Duration;

    struct Harness {
        store: Arc<FlakyStore>,
        sender: Arc<RecordingSender>,
        placement: OrderPlacement,
    }

    fn harness(sender: RecordingSender) -> Harness {
        let store = FlakyStore::new(
            MemoryStore::new()
                .with_settings(SiteSettings { serviceable_pincodes: "110001,110002".into(), support_phone: Some("1800-000".into()) })
                .with_admin_email("ops@shop.in"),
        );
        let sender = Arc::new(sender);
        let dyn_store: Arc<dyn RecordStore> = store.clone();
        let dyn_sender: Arc<dyn EmailSender> = sender.clone();
        let pincodes = Arc::new(PincodeValidator::new(dyn_store.clone(), Duration::ZERO));
        let notifier = Arc::new(NotificationDispatcher::new(dyn_sender, dyn_store.clone(), MessageContext::default()));
        Harness { store, sender, placement: OrderPlacement::new(dyn_store, pincodes, notifier, EventBus::disabled()) }
    }

    fn session_with(lines: &[(i64, i64, i64)]) -> CheckoutSession {
        let mut s = CheckoutSession::new();
        for &(id, price, qty) in lines { s.add_to_cart(&sample(id, price), qty).unwrap(); }
        s.begin_checkout().unwrap();
        s.enter_details().unwrap();
        s
    }

    #[tokio::test]
    async fn test_first_order_creates_customer_and_order() {
        let h = harness(RecordingSender::default());
        let mut s = session_with(&[(1, 250, 2)]);
        let placed = h.placement.place_order(&mut s, info("9876543210")).await.unwrap();

        assert_eq!(placed.total, Money::rupees(500));
        assert_eq!(h.store.inner.customer_count().await, 1);
        assert_eq!(h.store.inner.order_count().await, 1);
        let order = h.store.find_order(&placed.order_number).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);
        assert!(order.order_number.as_str().starts_with("EB"));
        assert_eq!(order.order_number.as_str().len(), 8);

        assert_eq!(s.step(), CheckoutStep::Confirmed);
        assert!(s.cart().is_empty());
        assert_eq!(s.confirmation().unwrap().total, Money::rupees(500));
        assert_eq!(h.sender.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_delivery_fee_is_charged_below_threshold() {
        let h = harness(RecordingSender::default());
        let mut s = session_with(&[(3, 180, 1)]);
        let placed = h.placement.place_order(&mut s, info("9876543210")).await.unwrap();
        assert_eq!(placed.total, Money::rupees(220));
    }

    #[tokio::test]
    async fn test_validation_failure_has_no_side_effects() {
        let h = harness(RecordingSender::default());
        let mut s = session_with(&[(1, 250, 1)]);
        let mut bad = info("12345");
        bad.name = String::new();
        let Err(PlaceOrderError::Validation(errors)) = h.placement.place_order(&mut s, bad).await else { panic!("expected validation error") };
        assert!(errors.contains_key("phone") && errors.contains_key("name"));
        assert_eq!(h.store.upserts.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(s.step(), CheckoutStep::AccountEntry);
        assert_eq!(s.cart().item_count(), 1);
        assert!(h.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unserviceable_pincode_is_a_field_error() {
        let h = harness(RecordingSender::default());
        let mut s = session_with(&[(1, 250, 1)]);
        let mut i = info("9876543210");
        i.pincode = "999999".into();
        let Err(PlaceOrderError::Validation(errors)) = h.placement.place_order(&mut s, i).await else { panic!("expected validation error") };
        assert_eq!(errors.len(), 1);
        assert!(errors["pincode"].contains("don't deliver"));
    }

    #[tokio::test]
    async fn test_customer_failure_aborts_before_order() {
        let h = harness(RecordingSender::default());
        h.store.fail_customers.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut s = session_with(&[(1, 250, 1)]);
        let err = h.placement.place_order(&mut s, info("9876543210")).await.unwrap_err();
        assert!(matches!(err, PlaceOrderError::Customer(_)));
        assert_eq!(h.store.inner.order_count().await, 0);
        assert_eq!(s.step(), CheckoutStep::AccountEntry);
        assert!(h.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_cart() {
        let h = harness(RecordingSender::default());
        h.store.fail_orders.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut s = session_with(&[(1, 250, 3)]);
        let err = h.placement.place_order(&mut s, info("9876543210")).await.unwrap_err();
        assert!(matches!(err, PlaceOrderError::Persistence(_)));
        assert!(err.to_string().contains("orders unavailable"));
        assert_eq!(s.step(), CheckoutStep::AccountEntry);
        assert_eq!(s.cart().item_count(), 3);
        assert_eq!(h.sender.attempts(), 0);

        // retry once the store recovers
        h.store.fail_orders.store(false, std::sync::atomic::Ordering::SeqCst);
        h.placement.place_order(&mut s, info("9876543210")).await.unwrap();
        assert_eq!(s.step(), CheckoutStep::Confirmed);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_undo_order() {
        let h = harness(RecordingSender::failing_all());
        let mut s = session_with(&[(1, 250, 2)]);
        let placed = h.placement.place_order(&mut s, info("9876543210")).await.unwrap();
        assert!(matches!(placed.notifications.operator, DeliveryOutcome::Failed(_)));
        assert!(matches!(placed.notifications.customer, DeliveryOutcome::Failed(_)));
        assert_eq!(s.step(), CheckoutStep::Confirmed);
        assert!(s.cart().is_empty());
        assert_eq!(h.store.inner.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_number_collision_is_retried() {
        let h = harness(RecordingSender::default());
        h.store.order_conflicts.store(2, std::sync::atomic::Ordering::SeqCst);
        let mut s = session_with(&[(1, 250, 2)]);
        let placed = h.placement.place_order(&mut s, info("9876543210")).await.unwrap();
        assert!(h.store.find_order(&placed.order_number).await.unwrap().is_some());

        h.store.order_conflicts.store(5, std::sync::atomic::Ordering::SeqCst);
        let mut s = session_with(&[(1, 250, 2)]);
        let err = h.placement.place_order(&mut s, info("9876543210")).await.unwrap_err();
        assert!(matches!(err, PlaceOrderError::Persistence(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_returning_customer_is_overwritten() {
        let h = harness(RecordingSender::default());
        let mut s = session_with(&[(1, 250, 2)]);
        h.placement.place_order(&mut s, info("9876543210")).await.unwrap();

        let mut s = session_with(&[(2, 100, 1)]);
        h.placement.customers().on_phone_input(&mut s.form, "9876543210").await.unwrap();
        assert!(s.form.phone_locked);
        let mut next = s.form.info.clone();
        next.address = "44 Park Street".into();
        next.pincode = "110002".into();
        h.placement.place_order(&mut s, next).await.unwrap();

        assert_eq!(h.store.inner.customer_count().await, 1);
        let c = h.store.find_customer_by_phone("9876543210").await.unwrap().unwrap();
        assert_eq!(c.address, "44 Park Street");
        assert_eq!(c.pincode, "110002");
    }

    #[tokio::test]
    async fn test_wrong_step_is_rejected() {
        let h = harness(RecordingSender::default());
        let mut s = CheckoutSession::new();
        s.add_to_cart(&sample(1, 250), 1).unwrap();
        let err = h.placement.place_order(&mut s, info("9876543210")).await.unwrap_err();
        assert!(matches!(err, PlaceOrderError::WrongStep(CheckoutStep::Browsing)));
        assert_eq!(s.step(), CheckoutStep::Browsing);
    }

    #[test]
    fn test_generator_never_repeats() {
        let g = OrderNumberGenerator::new();
        let numbers: HashSet<_> = (0..1000).map(|_| g.next()).collect();
        assert_eq!(numbers.len(), 1000);
    }
}
