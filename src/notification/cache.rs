use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{RideError, RideResult};

use super::Notification;

/// Last successfully fetched feed per recipient.
///
/// Owned by whoever holds it; nothing here is process-wide.
#[derive(Clone, Debug, Default)]
pub struct FeedCache {
    feeds: Arc<RwLock<HashMap<String, Vec<Notification>>>>,
}

impl FeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, recipient: &str) -> RideResult<Option<Vec<Notification>>> {
        let feeds = self
            .feeds
            .read()
            .map_err(|_| RideError::LockPoisoned("feed cache read"))?;
        Ok(feeds.get(recipient).cloned())
    }

    pub fn put(&self, recipient: &str, feed: Vec<Notification>) -> RideResult<()> {
        let mut feeds = self
            .feeds
            .write()
            .map_err(|_| RideError::LockPoisoned("feed cache write"))?;
        feeds.insert(recipient.to_string(), feed);
        Ok(())
    }

    /// Flip the cached copy of one notification to read, if present.
    pub fn mark_read(&self, recipient: &str, id: &str) -> RideResult<()> {
        let mut feeds = self
            .feeds
            .write()
            .map_err(|_| RideError::LockPoisoned("feed cache write"))?;
        if let Some(feed) = feeds.get_mut(recipient) {
            for notification in feed.iter_mut().filter(|n| n.id == id) {
                notification.read = true;
            }
        }
        Ok(())
    }

    pub fn invalidate(&self, recipient: &str) -> RideResult<()> {
        let mut feeds = self
            .feeds
            .write()
            .map_err(|_| RideError::LockPoisoned("feed cache write"))?;
        feeds.remove(recipient);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let feeds = Arc::clone(&self.feeds);
        let _ = std::thread::spawn(move || {
            let _guard = feeds.write();
            panic!("feed cache poisoned on purpose");
        })
        .join();
    }
}
