use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

/// Broadcast stop signal for a benchmark and the tasks it spawned.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            sender,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A receiver that also fires if the signal was triggered before the
    /// call.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
            triggered: Arc::clone(&self.triggered),
        }
    }

    pub fn trigger(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            debug!("shutdown already triggered");
            return;
        }
        let listeners = self.sender.receiver_count();
        let _ = self.sender.send(());
        info!(listeners, "shutdown triggered");
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ShutdownListener {
    receiver: broadcast::Receiver<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownListener {
    pub async fn recv(&mut self) {
        if self.triggered.load(Ordering::SeqCst) {
            return;
        }
        // Lagged or closed both mean the signal can no longer be missed.
        let _ = self.receiver.recv().await;
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_wakes_on_trigger() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.subscribe();

        let waiter = tokio::spawn(async move {
            listener.recv().await;
        });
        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_earlier_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        signal.trigger();

        let mut listener = signal.subscribe();
        assert!(listener.is_triggered());
        tokio::time::timeout(Duration::from_millis(100), listener.recv())
            .await
            .unwrap();
    }
}
