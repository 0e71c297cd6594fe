use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{RideError, RideResult};
use crate::store::{Connectivity, DocumentStore, DocumentStoreExt, Record, StoreError};
use crate::task::spawn_best_effort;

use super::{sort_notifications, FeedCache, Notification, NotificationKind, RECIPIENT_FIELD};

/// Creates, reads, marks, and clears notifications against the document store.
///
/// Each call returns a fresh ordered view. The only retained state is this
/// service's own [`FeedCache`], which backs degraded reads.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn DocumentStore>,
    connectivity: Arc<dyn Connectivity>,
    cache: FeedCache,
}

impl NotificationService {
    pub fn new(store: Arc<dyn DocumentStore>, connectivity: Arc<dyn Connectivity>) -> Self {
        NotificationService {
            store,
            connectivity,
            cache: FeedCache::new(),
        }
    }

    pub fn cache(&self) -> &FeedCache {
        &self.cache
    }

    /// Build a notification and persist it in the background.
    ///
    /// Returns the local record at once. Offline, the write is skipped;
    /// a failed write is logged. Neither reaches the caller.
    pub fn notify(&self, recipient: &str, request_id: &str, kind: NotificationKind) -> Notification {
        let notification = Notification::new(recipient, request_id, kind);
        if !self.connectivity.is_reachable() {
            debug!(recipient, request_id, ?kind, "offline, notification not sent");
            return notification;
        }

        let store = Arc::clone(&self.store);
        let record = notification.clone();
        spawn_best_effort("notify", async move {
            if let Err(err) = store.insert_record(&record).await {
                warn!(
                    recipient = %record.recipient,
                    request_id = %record.request_id,
                    error = %err,
                    "notification write failed"
                );
            }
        });
        notification
    }

    /// Like [`notify`](Self::notify) but waits for the store to acknowledge.
    pub async fn deliver(
        &self,
        recipient: &str,
        request_id: &str,
        kind: NotificationKind,
    ) -> RideResult<Notification> {
        if !self.connectivity.is_reachable() {
            return Err(StoreError::Unavailable("no connectivity".into()).into());
        }
        let notification = Notification::new(recipient, request_id, kind);
        self.store.insert_record(&notification).await?;
        Ok(notification)
    }

    /// Every notification the store currently shows for `recipient`, in display order.
    pub async fn try_fetch(&self, recipient: &str) -> RideResult<Vec<Notification>> {
        let mut feed: Vec<Notification> = self
            .store
            .query_all(RECIPIENT_FIELD, &recipient_key(recipient))
            .await?;
        sort_notifications(&mut feed);
        if let Err(err) = self.cache.put(recipient, feed.clone()) {
            warn!(recipient, error = %err, "feed cache not refreshed");
        }
        Ok(feed)
    }

    /// [`try_fetch`](Self::try_fetch), falling back to the last good view on failure.
    ///
    /// Never retries; a just-written notification may be missing.
    pub async fn fetch(&self, recipient: &str) -> Vec<Notification> {
        match self.try_fetch(recipient).await {
            Ok(feed) => feed,
            Err(err) => {
                warn!(recipient, error = %err, "notification fetch failed, serving cached feed");
                self.cache.get(recipient).ok().flatten().unwrap_or_default()
            }
        }
    }

    /// Persist the read flag, then flip it on `notification`.
    ///
    /// Already-read notifications are left alone. On failure the local copy
    /// stays unread. Once the store acknowledged, the call succeeds even if
    /// the cached feed cannot be updated.
    pub async fn mark_read(&self, notification: &mut Notification) -> RideResult<()> {
        if notification.read {
            return Ok(());
        }

        self.store
            .update_field(
                Notification::COLLECTION,
                notification.record_id(),
                "read",
                Value::Bool(true),
            )
            .await?;
        notification.read = true;
        if let Err(err) = self
            .cache
            .mark_read(&notification.recipient, &notification.id)
        {
            warn!(notification_id = %notification.id, error = %err, "feed cache not updated");
        }
        Ok(())
    }

    /// Mark each unread notification read; stops at the first failure.
    pub async fn mark_all_read(&self, recipient: &str) -> RideResult<usize> {
        let mut feed = self.try_fetch(recipient).await?;
        let mut marked = 0;
        for notification in feed.iter_mut().filter(|n| !n.read) {
            self.mark_read(notification).await?;
            marked += 1;
        }
        Ok(marked)
    }

    pub async fn has_unread(&self, recipient: &str) -> bool {
        self.fetch(recipient).await.iter().any(|n| !n.read)
    }

    /// Delete every notification for `recipient`, page by page, then drop the cached feed.
    ///
    /// Returns how many the store reported deleted; zero for an empty feed.
    pub async fn clear_all(&self, recipient: &str) -> RideResult<usize> {
        let deleted = self
            .store
            .delete_all(
                Notification::COLLECTION,
                RECIPIENT_FIELD,
                &recipient_key(recipient),
            )
            .await
            .map_err(RideError::from)?;
        if let Err(err) = self.cache.invalidate(recipient) {
            warn!(recipient, error = %err, "feed cache not invalidated");
        }
        debug!(recipient, deleted, "cleared notifications");
        Ok(deleted)
    }
}

fn recipient_key(recipient: &str) -> Value {
    json!(recipient)
}
