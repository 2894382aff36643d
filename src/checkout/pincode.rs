//! Pincode format and serviceability checks.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::warn;

use crate::domain::value_objects::{Pincode, PincodeError};
use crate::store::{RecordStore, StoreError};

/// Result of checking a (possibly partial) pincode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PincodeCheck {
    pub is_valid_format: bool,
    pub is_serviceable: bool,
    pub message: String,
}

impl PincodeCheck {
    fn new(is_valid_format: bool, is_serviceable: bool, message: impl Into<String>) -> Self {
        Self { is_valid_format, is_serviceable, message: message.into() }
    }

    /// Format-only result, computed without touching the store.
    pub fn local(code: &str) -> Option<Self> {
        match Pincode::parse(code) {
            Ok(_) => None,
            Err(PincodeError::Partial) => Some(Self::new(false, false, "Keep typing, pincodes have 6 digits")),
            Err(PincodeError::Invalid) => Some(Self::new(false, false, "Please enter a valid 6-digit pincode")),
        }
    }
}

struct CachedSet {
    fetched_at: Instant,
    pincodes: Arc<HashSet<String>>,
}

/// Checks pincodes against the serviceable list in site settings.
///
/// The list is cached for `ttl`; a zero ttl re-reads settings on every check.
pub struct PincodeValidator {
    store: Arc<dyn RecordStore>,
    ttl: Duration,
    cache: RwLock<Option<CachedSet>>,
}

impl PincodeValidator {
    pub fn new(store: Arc<dyn RecordStore>, ttl: Duration) -> Self {
        Self { store, ttl, cache: RwLock::new(None) }
    }

    /// Never fails: a settings outage degrades to "not serviceable".
    pub async fn validate(&self, code: &str) -> PincodeCheck {
        if let Some(local) = PincodeCheck::local(code) { return local; }
        let code = code.trim();
        match self.is_serviceable(code).await {
            Ok(true) => PincodeCheck::new(true, true, format!("Great! We deliver to {code}")),
            Ok(false) => PincodeCheck::new(true, false, format!("Sorry, we don't deliver to {code} yet")),
            Err(e) => {
                warn!(pincode = code, error = %e, "Serviceable pincode lookup failed");
                PincodeCheck::new(true, false, "We couldn't check delivery availability right now, please try again shortly")
            }
        }
    }

    pub async fn is_serviceable(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.serviceable_set().await?.contains(code.trim()))
    }

    pub async fn serviceable_set(&self) -> Result<Arc<HashSet<String>>, StoreError> {
        if !self.ttl.is_zero() {
            if let Some(cached) = self.cache.read().await.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl { return Ok(cached.pincodes.clone()); }
            }
        }
        let pincodes = Arc::new(self.store.settings().await?.pincode_set());
        *self.cache.write().await = Some(CachedSet { fetched_at: Instant::now(), pincodes: pincodes.clone() });
        Ok(pincodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SiteSettings};
    use crate::testing::FlakyStore;
    use std::sync::atomic::Ordering;

    fn store() -> Arc<FlakyStore> {
        FlakyStore::new(MemoryStore::new().with_settings(SiteSettings { serviceable_pincodes: "110001,110002".into(), support_phone: None }))
    }

    #[tokio::test]
    async fn test_serviceable_and_unserviceable() {
        let s = store();
        let v = PincodeValidator::new(s.clone(), Duration::ZERO);
        let ok = v.validate("110001").await;
        assert!(ok.is_valid_format && ok.is_serviceable);
        let no = v.validate("999999").await;
        assert!(no.is_valid_format && !no.is_serviceable);
        assert_eq!(s.settings_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_partial_input_skips_store() {
        let s = store();
        let v = PincodeValidator::new(s.clone(), Duration::ZERO);
        let partial = v.validate("12345").await;
        assert!(!partial.is_valid_format && !partial.is_serviceable);
        let bad = v.validate("0123456").await;
        assert!(!bad.is_valid_format);
        assert!(bad.message.contains("valid 6-digit"));
        assert_eq!(s.settings_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_settings_failure_degrades() {
        let s = store();
        s.fail_settings.store(true, Ordering::SeqCst);
        let v = PincodeValidator::new(s, Duration::ZERO);
        let check = v.validate("110001").await;
        assert!(check.is_valid_format);
        assert!(!check.is_serviceable);
        assert!(check.message.contains("couldn't check"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_respects_ttl() {
        let s = store();
        let v = PincodeValidator::new(s.clone(), Duration::from_secs(60));
        v.validate("110001").await;
        v.validate("110002").await;
        assert_eq!(s.settings_calls.load(Ordering::SeqCst), 1);
        tokio::time::advance(Duration::from_secs(61)).await;
        v.validate("110001").await;
        assert_eq!(s.settings_calls.load(Ordering::SeqCst), 2);
    }
}
