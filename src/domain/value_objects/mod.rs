//! Value Objects for the storefront

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::sync::LazyLock;
use thiserror::Error;

static PINCODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[1-9][0-9]{5}$").expect("valid pincode pattern"));
static PINCODE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{1,5}$").expect("valid prefix pattern"));
pub(crate) static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{10}$").expect("valid phone pattern"));

/// Money value object, always in rupees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn rupees(amount: i64) -> Self { Self(Decimal::from(amount)) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn multiply(&self, qty: u32) -> Money { Money(self.0 * Decimal::from(qty)) }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, Add::add) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "₹{}", self.0.normalize()) }
}

/// Six digit Indian postal code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pincode(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PincodeError {
    /// Digits only, but fewer than six of them.
    #[error("pincode incomplete")]
    Partial,
    #[error("enter a valid 6-digit pincode")]
    Invalid,
}

impl Pincode {
    pub fn parse(value: &str) -> Result<Self, PincodeError> {
        let value = value.trim();
        if PINCODE_RE.is_match(value) { return Ok(Self(value.to_string())); }
        if PINCODE_PREFIX_RE.is_match(value) { return Err(PincodeError::Partial); }
        Err(PincodeError::Invalid)
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Pincode {
    type Error = PincodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(&value) }
}

impl From<Pincode> for String {
    fn from(p: Pincode) -> String { p.0 }
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Ten digit mobile number; the natural key for customers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("phone number must be exactly 10 digits")]
pub struct PhoneError;

impl Phone {
    pub fn parse(value: &str) -> Result<Self, PhoneError> {
        let value = value.trim();
        if PHONE_RE.is_match(value) { Ok(Self(value.to_string())) } else { Err(PhoneError) }
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Phone {
    type Error = PhoneError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(&value) }
}

impl From<Phone> for String {
    fn from(p: Phone) -> String { p.0 }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Human readable order code, `EB` followed by six digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const PREFIX: &'static str = "EB";

    /// Builds the code from the last six decimal digits of an epoch-millisecond timestamp.
    pub fn from_millis(millis: u64) -> Self { Self(format!("{}{:06}", Self::PREFIX, millis % 1_000_000)) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self { Self(s) }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pincode_parse() {
        assert_eq!(Pincode::parse("110001").unwrap().as_str(), "110001");
        assert_eq!(Pincode::parse("12345"), Err(PincodeError::Partial));
        assert_eq!(Pincode::parse("012345"), Err(PincodeError::Invalid));
        assert_eq!(Pincode::parse("1100011"), Err(PincodeError::Invalid));
        assert_eq!(Pincode::parse("11a001"), Err(PincodeError::Invalid));
    }

    #[test]
    fn test_phone_parse() {
        assert!(Phone::parse("9876543210").is_ok());
        assert!(Phone::parse("987654321").is_err());
        assert!(Phone::parse("98765432100").is_err());
        assert!(Phone::parse("98765 43210").is_err());
    }

    #[test]
    fn test_order_number_format() {
        assert_eq!(OrderNumber::from_millis(1_700_000_482_193).as_str(), "EB482193");
        assert_eq!(OrderNumber::from_millis(1_700_000_000_042).as_str(), "EB000042");
    }

    #[test]
    fn test_money_sum() {
        let total: Money = [Money::rupees(250).multiply(2), Money::rupees(40)].into_iter().sum();
        assert_eq!(total, Money::rupees(540));
        assert_eq!(total.to_string(), "₹540");
    }
}
