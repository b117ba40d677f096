//! Process-wide shutdown signalling
//!
//! A sticky flag plus a `Notify`: the flag answers "has shutdown been
//! requested" at any time, the notify wakes loops parked in `select!`.
//! Once triggered the signal never resets.

use crate::logger::{self, LogTag};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        if !self.requested.swap(true, Ordering::AcqRel) {
            logger::info(LogTag::System, "Shutdown requested");
        }
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has been requested (immediately if already)
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a trigger in between is not lost
            notified.as_mut().enable();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

/// Install Ctrl+C handling that triggers `signal`
pub fn install_shutdown_handler(signal: ShutdownSignal) -> Result<(), String> {
    ctrlc::set_handler(move || {
        if signal.is_triggered() {
            eprintln!("\nSecond interrupt received, exiting immediately");
            std::process::exit(130);
        }
        signal.trigger();
    })
    .map_err(|e| format!("Failed to install Ctrl+C handler: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_after_trigger() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .expect("join");
    }

    #[tokio::test]
    async fn test_wait_is_immediate_when_already_triggered() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("already triggered");
        assert!(signal.is_triggered());
    }
}
