use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use canopy_common::Notification;

use crate::SocialGraphReader;

/// A live-updating read: a background poller that pushes ordered,
/// deduplicated snapshots over a channel until cancelled. Dropping the
/// subscription (or calling `unsubscribe`) stops the poller.
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T> {
    /// Next snapshot, or None once the subscription has ended.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {
        self.task.abort();
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Live notification list for a user, newest first. A snapshot is
/// delivered immediately and then whenever the list's content or
/// read-state changes.
pub fn subscribe_notifications(
    reader: SocialGraphReader,
    user_id: &str,
    limit: i64,
    poll_interval: Duration,
) -> Subscription<Vec<Notification>> {
    let user_id = user_id.to_string();
    let (tx, rx) = mpsc::channel(8);

    let task = tokio::spawn(async move {
        let mut last_fingerprint: Option<Vec<(uuid::Uuid, bool)>> = None;
        loop {
            match reader.list_notifications(&user_id, limit).await {
                Ok(items) => {
                    let fingerprint: Vec<(uuid::Uuid, bool)> =
                        items.iter().map(|n| (n.id, n.read)).collect();
                    if last_fingerprint.as_ref() != Some(&fingerprint) {
                        last_fingerprint = Some(fingerprint);
                        if tx.send(items).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    // Transient read failures skip a tick rather than
                    // ending the subscription.
                    warn!(user_id, error = %e, "notification poll failed");
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    });

    Subscription { rx, task }
}

/// Live unread-notification count for a user. Delivers the current value
/// immediately, then only on change.
pub fn subscribe_unread_count(
    reader: SocialGraphReader,
    user_id: &str,
    poll_interval: Duration,
) -> Subscription<i64> {
    let user_id = user_id.to_string();
    let (tx, rx) = mpsc::channel(8);

    let task = tokio::spawn(async move {
        let mut last: Option<i64> = None;
        loop {
            match reader.unread_count(&user_id).await {
                Ok(count) => {
                    if last != Some(count) {
                        last = Some(count);
                        if tx.send(count).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(user_id, error = %e, "unread count poll failed");
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    });

    Subscription { rx, task }
}
