//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `DATABASE_URL` - Postgres connection string (default: in-memory store)
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `NATS_URL` - NATS server for catalog change notices and order events
//! - `CATALOG_POLL_SECS` - Catalog poll interval without NATS (default: 30)
//! - `SETTINGS_TTL_SECS` - Serviceable pincode cache lifetime (default: 60)
//! - `PINCODE_DEBOUNCE_MS` - Idle time before a typed pincode is checked (default: 500)
//! - `SESSION_IDLE_SECS` - Checkout sessions idle this long are dropped (default: 1800)
//! - `STORE_NAME` - Shop name used in emails (default: Doorstep)
//! - `SUPPORT_PHONE` - Support number printed in customer emails
//! - `DELIVERY_WINDOW` - Delivery promise in customer emails (default: within 24 hours)
//!
//! ## Email (all four required to enable sending)
//! - `EMAIL_SERVICE_ID`, `EMAIL_PUBLIC_KEY`, `EMAIL_OPERATOR_TEMPLATE`, `EMAIL_CUSTOMER_TEMPLATE`
//! - `EMAIL_ENDPOINT` - Send endpoint (default: https://api.emailjs.com/api/v1.0/email/send)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::notify::{EmailConfig, MessageContext};

const DEFAULT_EMAIL_ENDPOINT: &str = "https://api.emailjs.com/api/v1.0/email/send";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub nats_url: Option<String>,
    pub catalog_poll: Duration,
    pub settings_ttl: Duration,
    pub pincode_debounce: Duration,
    pub session_idle: Duration,
    pub messages: MessageContext,
    pub email: Option<EmailConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables, reading `.env` if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let email = match (var("EMAIL_SERVICE_ID"), var("EMAIL_PUBLIC_KEY"), var("EMAIL_OPERATOR_TEMPLATE"), var("EMAIL_CUSTOMER_TEMPLATE")) {
            (Some(service_id), Some(public_key), Some(operator_template), Some(customer_template)) => Some(EmailConfig {
                endpoint: var("EMAIL_ENDPOINT").unwrap_or_else(|| DEFAULT_EMAIL_ENDPOINT.to_string()),
                service_id,
                public_key,
                operator_template,
                customer_template,
            }),
            _ => None,
        };

        let defaults = MessageContext::default();
        Ok(Self {
            database_url: var("DATABASE_URL"),
            host: parse(&var, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse(&var, "PORT", 8083)?,
            nats_url: var("NATS_URL"),
            catalog_poll: Duration::from_secs(parse(&var, "CATALOG_POLL_SECS", 30)?),
            settings_ttl: Duration::from_secs(parse(&var, "SETTINGS_TTL_SECS", 60)?),
            pincode_debounce: Duration::from_millis(parse(&var, "PINCODE_DEBOUNCE_MS", 500)?),
            session_idle: Duration::from_secs(parse::<u64>(&var, "SESSION_IDLE_SECS", 1800)?.max(1)),
            messages: MessageContext {
                store_name: var("STORE_NAME").unwrap_or(defaults.store_name),
                delivery_window: var("DELIVERY_WINDOW").unwrap_or(defaults.delivery_window),
                support_phone: var("SUPPORT_PHONE"),
            },
            email,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }

    /// How often idle sessions are swept.
    pub fn session_sweep(&self) -> Duration { self.session_idle.min(Duration::from_secs(60)) }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = load(&[]).unwrap();
        assert_eq!(c.port, 8083);
        assert_eq!(c.pincode_debounce, Duration::from_millis(500));
        assert!(c.database_url.is_none());
        assert!(c.email.is_none());
        assert_eq!(c.messages.delivery_window, "within 24 hours");
        assert_eq!(c.session_idle, Duration::from_secs(1800));
        assert_eq!(c.session_sweep(), Duration::from_secs(60));
    }

    #[test]
    fn test_session_idle_floor() {
        let c = load(&[("SESSION_IDLE_SECS", "0")]).unwrap();
        assert_eq!(c.session_idle, Duration::from_secs(1));
        assert_eq!(c.session_sweep(), Duration::from_secs(1));
    }

    #[test]
    fn test_email_needs_all_keys() {
        let partial = load(&[("EMAIL_SERVICE_ID", "svc"), ("EMAIL_PUBLIC_KEY", "pk")]).unwrap();
        assert!(partial.email.is_none());
        let full = load(&[
            ("EMAIL_SERVICE_ID", "svc"), ("EMAIL_PUBLIC_KEY", "pk"),
            ("EMAIL_OPERATOR_TEMPLATE", "t_op"), ("EMAIL_CUSTOMER_TEMPLATE", "t_cu"),
        ]).unwrap();
        let email = full.email.unwrap();
        assert_eq!(email.operator_template, "t_op");
        assert_eq!(email.endpoint, DEFAULT_EMAIL_ENDPOINT);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "PORT"));
    }
}
