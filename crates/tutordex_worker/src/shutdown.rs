//! Graceful shutdown signal plumbing.
//!
//! Extends `casparian_worker::cancel::CancellationToken`'s `AtomicBool`
//! shape to a `tokio::sync::watch` channel so callers can `.await` the
//! transition instead of polling `is_cancelled()` in a spin loop, then wires
//! it to SIGINT/SIGTERM via `tokio::signal`.

use tokio::sync::watch;

#[derive(Clone)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Resolves once shutdown has been triggered. Cloning the receiver
    /// means every caller observes the same transition independently.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a task that triggers `signal` on SIGINT or SIGTERM. Returns
/// immediately; the spawned task lives for the process lifetime.
#[cfg(unix)]
pub fn install_signal_handlers(signal: ShutdownSignal) {
    tokio::spawn(async move {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, starting graceful shutdown");
            }
            _ = term.recv() => {
                tracing::info!("received SIGTERM, starting graceful shutdown");
            }
        }
        signal.trigger();
    });
}

#[cfg(not(unix))]
pub fn install_signal_handlers(signal: ShutdownSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received Ctrl-C, starting graceful shutdown");
            signal.trigger();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn triggered_resolves_immediately_if_already_set() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        tokio::time::timeout(std::time::Duration::from_millis(50), signal.triggered())
            .await
            .expect("should resolve without waiting");
    }

    #[tokio::test]
    async fn triggered_resolves_once_trigger_is_called() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.triggered().await });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!handle.is_finished());

        signal.trigger();
        tokio::time::timeout(std::time::Duration::from_millis(100), handle)
            .await
            .expect("task should finish")
            .unwrap();
    }

    #[tokio::test]
    async fn clones_share_state() {
        let a = ShutdownSignal::new();
        let b = a.clone();
        assert!(!b.is_triggered());
        a.trigger();
        assert!(b.is_triggered());
    }
}
