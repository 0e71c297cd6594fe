mod cache;
mod kind;
mod notification;
mod service;

pub use cache::FeedCache;
pub use kind::NotificationKind;
pub use notification::{display_order, sort_notifications, Notification, RECIPIENT_FIELD};
pub use service::NotificationService;
