//! External interruption handling.
//!
//! The listener never gets cancelled mid-operation: it checks [`Shutdown::is_requested`]
//! between iterations and uses [`Shutdown::sleep`] for its backoff and poll delays, which
//! return early once a shutdown is requested.
use log::{info, warn};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

/// Sending half; flips the flag once.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving half held by the listener and the session.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `dur` unless shutdown is requested first.
    /// Returns `true` if the sleep was cut short (or shutdown was already requested).
    pub async fn sleep(&mut self, dur: Duration) -> bool {
        if self.is_requested() {
            return true;
        }
        let timer = sleep(dur);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                _ = &mut timer => return self.is_requested(),
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        // Trigger dropped; nobody can request shutdown any more.
                        (&mut timer).await;
                        return false;
                    }
                    if self.is_requested() {
                        return true;
                    }
                }
            }
        }
    }
}

/// Spawn a watcher that requests shutdown on Ctrl-C (and SIGTERM on Unix).
pub fn listen_for_signals() -> Shutdown {
    let (trigger, shutdown) = channel();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal");
        trigger.trigger();
    });
    shutdown
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn sleep_runs_to_completion_without_trigger() {
        let (_trigger, mut shutdown) = channel();
        assert!(!shutdown.sleep(Duration::from_millis(5)).await);
        assert!(!shutdown.is_requested());
    }

    #[tokio::test]
    async fn trigger_cuts_sleep_short() {
        let (trigger, mut shutdown) = channel();
        let start = Instant::now();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });
        assert!(shutdown.sleep(Duration::from_secs(30)).await);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn already_requested_returns_immediately() {
        let (trigger, mut shutdown) = channel();
        trigger.trigger();
        assert!(shutdown.sleep(Duration::from_secs(30)).await);
    }

    #[tokio::test]
    async fn dropped_trigger_still_sleeps() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);
        assert!(!shutdown.sleep(Duration::from_millis(5)).await);
    }
}
