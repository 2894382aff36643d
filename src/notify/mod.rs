//! Order notifications: one alert to the operator and one confirmation to the customer.
//!
//! Both messages go out concurrently through an [`EmailSender`]. Delivery is
//! best effort; failures come back as [`DeliveryOutcome`]s and are never
//! raised to the caller.

mod http;
mod templates;

pub use http::{EmailConfig, HttpEmailSender, LogEmailSender};
pub use templates::{customer_params, items_fragment, operator_params, MessageContext};

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::aggregates::{CustomerInfo, Order};
use crate::domain::value_objects::OrderNumber;
use crate::store::RecordStore;

/// Flat parameter map handed to the email template.
pub type TemplateParams = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate { OperatorAlert, CustomerConfirmation }

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("email delivery failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, template: EmailTemplate, recipient: &str, params: &TemplateParams) -> Result<(), EmailError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed(String),
    /// Nothing to send to, e.g. no address on file.
    Skipped(String),
    /// Another dispatch for the same order was still running.
    Suppressed,
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool { matches!(self, Self::Sent) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    pub operator: DeliveryOutcome,
    pub customer: DeliveryOutcome,
}

impl NotificationReport {
    fn suppressed() -> Self { Self { operator: DeliveryOutcome::Suppressed, customer: DeliveryOutcome::Suppressed } }

    /// Human readable notes for everything that did not go out.
    pub fn warnings(&self) -> Vec<String> {
        [("operator", &self.operator), ("customer", &self.customer)]
            .into_iter()
            .filter_map(|(who, outcome)| match outcome {
                DeliveryOutcome::Sent => None,
                DeliveryOutcome::Failed(e) => Some(format!("{who} notification failed: {e}")),
                DeliveryOutcome::Skipped(why) => Some(format!("{who} notification skipped: {why}")),
                DeliveryOutcome::Suppressed => Some(format!("{who} notification suppressed as duplicate")),
            })
            .collect()
    }
}

pub struct NotificationDispatcher {
    sender: Arc<dyn EmailSender>,
    store: Arc<dyn RecordStore>,
    context: MessageContext,
    in_flight: Mutex<HashSet<OrderNumber>>,
}

/// Holds an order number in the in-flight set until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<OrderNumber>>,
    key: OrderNumber,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}

impl NotificationDispatcher {
    pub fn new(sender: Arc<dyn EmailSender>, store: Arc<dyn RecordStore>, context: MessageContext) -> Self {
        Self { sender, store, context, in_flight: Mutex::new(HashSet::new()) }
    }

    /// Looks up the operator address, then sends both messages.
    pub async fn notify_order_placed(&self, order: &Order, customer: &CustomerInfo) -> NotificationReport {
        let operator = match self.store.admin_email().await {
            Ok(addr) => addr,
            Err(e) => {
                warn!(order_number = %order.order_number, error = %e, "Operator address lookup failed");
                None
            }
        };
        self.send_order_notifications(order, customer, operator.as_deref()).await
    }

    pub async fn send_order_notifications(&self, order: &Order, customer: &CustomerInfo, operator: Option<&str>) -> NotificationReport {
        let Some(_guard) = self.claim(&order.order_number) else {
            warn!(order_number = %order.order_number, "Notification dispatch already running, suppressing duplicate");
            return NotificationReport::suppressed();
        };

        let operator_fut = async {
            match operator {
                Some(to) => self.deliver(EmailTemplate::OperatorAlert, to, operator_params(order, customer, &self.context)).await,
                None => DeliveryOutcome::Skipped("no admin notification address configured".into()),
            }
        };
        let customer_fut = async {
            match customer.email() {
                Some(to) => self.deliver(EmailTemplate::CustomerConfirmation, to, customer_params(order, customer, &self.context)).await,
                None => DeliveryOutcome::Skipped("customer gave no email address".into()),
            }
        };
        let (operator, customer) = tokio::join!(operator_fut, customer_fut);

        let report = NotificationReport { operator, customer };
        for w in report.warnings() {
            warn!(order_number = %order.order_number, "{w}");
        }
        report
    }

    async fn deliver(&self, template: EmailTemplate, to: &str, params: TemplateParams) -> DeliveryOutcome {
        match self.sender.send(template, to, &params).await {
            Ok(()) => {
                info!(?template, order_number = params.get("order_number").map(String::as_str).unwrap_or_default(), "Notification sent");
                DeliveryOutcome::Sent
            }
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        }
    }

    fn claim(&self, order_number: &OrderNumber) -> Option<InFlight<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(order_number.clone()) { return None; }
        Some(InFlight { set: &self.in_flight, key: order_number.clone() })
    }
}
