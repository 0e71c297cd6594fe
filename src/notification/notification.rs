use std::cmp::Ordering;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Record;

use super::NotificationKind;

/// Document field notifications are queried and cleared by.
pub const RECIPIENT_FIELD: &str = "recipient";

/// "`recipient` should know about `kind` on `request_id`."
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient: String,
    pub request_id: String,
    pub kind: NotificationKind,
    pub created_at: SystemTime,
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    /// A fresh unread notification stamped now, with a client-generated id.
    pub fn new(
        recipient: impl Into<String>,
        request_id: impl Into<String>,
        kind: NotificationKind,
    ) -> Self {
        Notification {
            id: Uuid::new_v4().to_string(),
            recipient: recipient.into(),
            request_id: request_id.into(),
            kind,
            created_at: SystemTime::now(),
            read: false,
        }
    }

    pub fn with_created_at(mut self, created_at: SystemTime) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn describe(&self) -> &'static str {
        self.kind.describe()
    }
}

impl Record for Notification {
    const COLLECTION: &'static str = "notifications";

    fn record_id(&self) -> &str {
        &self.id
    }
}

/// Display order: unread before read, then newest first.
///
/// Equal read state and timestamp compare `Equal`; [`sort_notifications`]
/// keeps such ties in input order.
pub fn display_order(a: &Notification, b: &Notification) -> Ordering {
    a.read
        .cmp(&b.read)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

pub fn sort_notifications(notifications: &mut [Notification]) {
    notifications.sort_by(display_order);
}
