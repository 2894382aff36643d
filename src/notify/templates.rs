//! Template parameters for operator and customer emails.

use std::fmt::Write;

use super::TemplateParams;
use crate::domain::aggregates::{AddressType, CustomerInfo, Order};

/// Shop details printed in the customer confirmation.
#[derive(Clone, Debug)]
pub struct MessageContext {
    pub store_name: String,
    pub delivery_window: String,
    pub support_phone: Option<String>,
}

impl Default for MessageContext {
    fn default() -> Self {
        Self { store_name: "Doorstep".into(), delivery_window: "within 24 hours".into(), support_phone: None }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Pre-rendered HTML table rows for the ordered items.
pub fn items_fragment(order: &Order) -> String {
    order.items.iter().fold(String::new(), |mut out, item| {
        let _ = write!(
            out,
            "<tr><td>{} ({})</td><td>{}</td><td>{}</td></tr>",
            escape(&item.name),
            escape(&item.weight),
            item.quantity,
            item.price.multiply(item.quantity),
        );
        out
    })
}

fn address_type(t: AddressType) -> &'static str {
    match t { AddressType::Home => "Home", AddressType::Office => "Office", AddressType::Other => "Other" }
}

fn base_params(order: &Order, customer: &CustomerInfo) -> TemplateParams {
    let mut p = TemplateParams::new();
    p.insert("order_number".into(), order.order_number.to_string());
    p.insert("order_date".into(), order.order_date.format("%d %b %Y, %H:%M UTC").to_string());
    p.insert("customer_name".into(), order.customer_name.clone());
    p.insert("customer_phone".into(), order.customer_phone.clone());
    p.insert("customer_email".into(), order.customer_email.clone().unwrap_or_default());
    p.insert("customer_address".into(), order.customer_address.clone());
    p.insert("customer_pincode".into(), order.customer_pincode.clone());
    p.insert("address_type".into(), address_type(customer.address_type).into());
    p.insert("landmark".into(), customer.landmark.clone().unwrap_or_default());
    p.insert("items_html".into(), items_fragment(order));
    p.insert("total".into(), order.total.to_string());
    p
}

pub fn operator_params(order: &Order, customer: &CustomerInfo, ctx: &MessageContext) -> TemplateParams {
    let mut p = base_params(order, customer);
    let mut body = format!(
        "New cash-on-delivery order {} for {}.\n\nCustomer: {} ({})\nAddress: {}, {} [{}]\n",
        order.order_number, order.total, order.customer_name, order.customer_phone,
        order.customer_address, order.customer_pincode, address_type(customer.address_type),
    );
    if let Some(l) = &customer.landmark { let _ = writeln!(body, "Landmark: {l}"); }
    body.push_str("\nItems:\n");
    for item in &order.items {
        let _ = writeln!(body, "- {} ({}) x {} = {}", item.name, item.weight, item.quantity, item.price.multiply(item.quantity));
    }
    body.push_str("\nPlease call the customer to confirm and schedule delivery.");
    p.insert("subject".into(), format!("[{}] New order {}", ctx.store_name, order.order_number));
    p.insert("message".into(), body);
    p
}

pub fn customer_params(order: &Order, customer: &CustomerInfo, ctx: &MessageContext) -> TemplateParams {
    let mut p = base_params(order, customer);
    let mut body = format!(
        "Hi {}, thank you for ordering from {}!\n\nOrder {} totalling {} will be delivered {} to {}, {}.\nPay in cash when it arrives.",
        order.customer_name, ctx.store_name, order.order_number, order.total, ctx.delivery_window,
        order.customer_address, order.customer_pincode,
    );
    if let Some(phone) = &ctx.support_phone {
        let _ = write!(body, "\n\nQuestions? Call us on {phone}.");
    }
    p.insert("to_name".into(), order.customer_name.clone());
    p.insert("subject".into(), format!("Your {} order {} is confirmed", ctx.store_name, order.order_number));
    p.insert("delivery_window".into(), ctx.delivery_window.clone());
    p.insert("support_phone".into(), ctx.support_phone.clone().unwrap_or_default());
    p.insert("message".into(), body);
    p
}
