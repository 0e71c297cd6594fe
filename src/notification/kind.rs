use std::fmt;

use serde::{Deserialize, Serialize};

/// The lifecycle event a notification reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Sent to the rider when a driver offers on their request.
    OfferReceived,
    /// Sent to the driver the rider confirmed.
    OfferAccepted,
}

impl NotificationKind {
    pub fn describe(self) -> &'static str {
        match self {
            NotificationKind::OfferReceived => "A driver has offered on your request",
            NotificationKind::OfferAccepted => "Your offer was accepted",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
