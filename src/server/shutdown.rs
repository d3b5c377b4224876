//! Shutdown coordination

use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

/// Process-wide shutdown switch. Cloning shares the same flag.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    tx: broadcast::Sender<()>,
}

/// Receiving side of a [`ShutdownHandle`]
pub struct ShutdownListener {
    flag: Arc<AtomicBool>,
    rx: broadcast::Receiver<()>,
}

impl ShutdownHandle {
    /// Create an untriggered handle
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Set the flag and wake every listener. Only the first call broadcasts.
    pub fn trigger(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    /// Whether shutdown has been requested
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Subscribe a listener. A listener created after [`trigger`](Self::trigger)
    /// still observes the shutdown.
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
            flag: Arc::clone(&self.flag),
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownListener {
    /// Resolve once shutdown has been requested
    pub async fn recv(&mut self) {
        if self.flag.load(Ordering::SeqCst) {
            return;
        }
        // Closed means every handle is gone, which is also a shutdown.
        let _ = self.rx.recv().await;
    }
}

/// Install SIGINT and SIGTERM handlers that trigger `handle`.
///
/// Registration happens before returning, so a failure is a setup error.
/// Must be called from within a Tokio runtime.
pub fn trigger_on_signal(handle: ShutdownHandle) -> Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }

        info!("Caught signal, exiting");
        handle.trigger();
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_listener_wakes_on_trigger() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.listener();

        let waiter = tokio::spawn(async move { listener.recv().await });
        handle.trigger();

        assert!(timeout(Duration::from_secs(1), waiter).await.is_ok());
        assert!(handle.is_triggered());
    }

    #[tokio::test]
    async fn test_late_listener_sees_earlier_trigger() {
        let handle = ShutdownHandle::new();
        handle.trigger();

        let mut listener = handle.listener();
        assert!(timeout(Duration::from_millis(100), listener.recv()).await.is_ok());
    }

    #[tokio::test]
    async fn test_trigger_is_idempotent() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.listener();
        handle.trigger();
        handle.trigger();

        listener.recv().await;
        assert!(handle.is_triggered());
    }

    #[tokio::test]
    async fn test_sigterm_triggers_handle() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.listener();
        let waiter = trigger_on_signal(handle.clone()).unwrap();

        nix::sys::signal::raise(nix::sys::signal::Signal::SIGTERM).unwrap();

        timeout(Duration::from_secs(2), listener.recv()).await.unwrap();
        timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
        assert!(handle.is_triggered());
    }

    #[tokio::test]
    async fn test_untriggered_listener_stays_pending() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.listener();
        assert!(timeout(Duration::from_millis(50), listener.recv()).await.is_err());
    }
}
