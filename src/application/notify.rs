use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{LedgerEvent, Notification};
use crate::storage::Repository;

/// Receives ledger events after their mutation has committed.
///
/// Implementations must not block and must not fail the caller: the ledger
/// result is already durable when `notify` runs.
pub trait NotificationHook: Send + Sync {
    fn notify(&self, event: LedgerEvent);
}

/// Logs every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationHook for TracingNotifier {
    fn notify(&self, event: LedgerEvent) {
        info!(
            user_id = %event.user_id(),
            kind = event.kind(),
            message = %event.message(),
            "ledger event"
        );
    }
}

/// Forwards events to an unbounded channel, usually drained by a
/// [`NotificationWorker`].
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<LedgerEvent>,
}

impl ChannelNotifier {
    pub fn new(tx: UnboundedSender<LedgerEvent>) -> Self {
        Self { tx }
    }

    /// Create a notifier together with the receiving end of its channel.
    pub fn channel() -> (Self, UnboundedReceiver<LedgerEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl NotificationHook for ChannelNotifier {
    fn notify(&self, event: LedgerEvent) {
        if let Err(err) = self.tx.send(event) {
            warn!(kind = err.0.kind(), "notification channel closed, event dropped");
        }
    }
}

/// Persists a [`Notification`] for every event it receives.
pub struct NotificationWorker;

impl NotificationWorker {
    /// Drain `rx` on a background task until every sender is dropped.
    pub fn spawn(
        repo: Arc<Repository>,
        mut rx: UnboundedReceiver<LedgerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let notification = Notification::from_event(&event);
                match repo.save_notification(&notification).await {
                    Ok(()) => debug!(
                        user_id = %notification.user_id,
                        kind = %notification.kind,
                        "notification stored"
                    ),
                    Err(err) => warn!(
                        user_id = %notification.user_id,
                        error = %err,
                        "failed to store notification"
                    ),
                }
            }
        })
    }
}
