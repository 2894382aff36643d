//! Customer record and the details captured at checkout

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;
use crate::domain::value_objects::PHONE_RE;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType { #[default] Home, Office, Other }

/// Details typed into the checkout form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct CustomerInfo {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(regex(path = "PHONE_RE", message = "Enter a valid 10-digit phone number"))]
    pub phone: String,
    #[validate(email(message = "Enter a valid email address"))]
    #[serde(default)]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "Pincode is required"))]
    pub pincode: String,
    #[serde(default)]
    pub address_type: AddressType,
    #[serde(default)]
    pub landmark: Option<String>,
}

impl CustomerInfo {
    /// Trims every field and turns blank optionals into `None`.
    pub fn normalized(mut self) -> Self {
        fn opt(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        self.name = self.name.trim().to_string();
        self.phone = self.phone.trim().to_string();
        self.address = self.address.trim().to_string();
        self.pincode = self.pincode.trim().to_string();
        self.email = opt(self.email);
        self.landmark = opt(self.landmark);
        self
    }

    pub fn email(&self) -> Option<&str> { self.email.as_deref().map(str::trim).filter(|s| !s.is_empty()) }

    /// Field-keyed messages for every failing rule; empty when the form is well formed.
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let Err(errors) = self.validate() else { return BTreeMap::new() };
        errors.field_errors().into_iter().filter_map(|(field, errs)| {
            let first = errs.first()?;
            let message = first.message.as_ref().map_or_else(|| format!("{field} is invalid"), ToString::to_string);
            Some((field.to_string(), message))
        }).collect()
    }
}

/// Returning customer, keyed by phone number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub address: String,
    pub pincode: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn from_info(info: &CustomerInfo) -> Self {
        let now = Utc::now();
        Self {
            phone: info.phone.clone(),
            name: info.name.clone(),
            email: info.email().map(str::to_string),
            address: info.address.clone(),
            pincode: info.pincode.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Latest submission wins.
    pub fn apply(&mut self, info: &CustomerInfo) {
        self.name = info.name.clone();
        self.email = info.email().map(str::to_string);
        self.address = info.address.clone();
        self.pincode = info.pincode.clone();
        self.updated_at = Utc::now();
    }
}
