//! Cancellable delayed tasks and the debounced pincode watcher.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::pincode::{PincodeCheck, PincodeValidator};

/// Runs the most recently scheduled task once `delay` has passed without a newer one.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self { Self { delay, pending: Mutex::new(None) } }

    /// Cancels whatever is pending and starts a fresh timer for `task`.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        if let Some(previous) = self.lock().replace(handle) { previous.abort(); }
    }

    /// Returns whether a pending task was cancelled.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(handle) if !handle.is_finished() => { handle.abort(); true }
            _ => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) { self.cancel(); }
}

/// Pincode field that validates after the input goes idle.
///
/// Incomplete or malformed input is answered immediately; a full six digit
/// code is checked against the store once the debounce delay elapses.
pub struct PincodeWatcher {
    validator: Arc<PincodeValidator>,
    debouncer: Debouncer,
    tx: Arc<watch::Sender<Option<PincodeCheck>>>,
}

impl PincodeWatcher {
    pub fn new(validator: Arc<PincodeValidator>, delay: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { validator, debouncer: Debouncer::new(delay), tx: Arc::new(tx) }
    }

    pub fn input(&self, code: &str) {
        self.debouncer.cancel();
        if let Some(local) = PincodeCheck::local(code) {
            self.tx.send_replace(Some(local));
            return;
        }
        self.tx.send_replace(None);
        let (validator, tx, code) = (self.validator.clone(), self.tx.clone(), code.to_string());
        self.debouncer.schedule(async move {
            let check = validator.validate(&code).await;
            tx.send_replace(Some(check));
        });
    }

    /// Latest result, `None` while a check is pending or nothing was typed.
    pub fn latest(&self) -> Option<PincodeCheck> { self.tx.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<Option<PincodeCheck>> { self.tx.subscribe() }
}
