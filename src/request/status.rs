use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a request sits in its lifecycle.
///
/// `Open -> Offered -> Confirmed -> Complete -> Paid`, with `Cancelled`
/// reachable from the first three and terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[default]
    Open,
    Offered,
    Confirmed,
    Complete,
    Paid,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::Open,
        RequestStatus::Offered,
        RequestStatus::Confirmed,
        RequestStatus::Complete,
        RequestStatus::Paid,
        RequestStatus::Cancelled,
    ];

    /// Drivers may still offer.
    pub fn accepts_offers(self) -> bool {
        matches!(self, RequestStatus::Open | RequestStatus::Offered)
    }

    pub fn can_cancel(self) -> bool {
        matches!(
            self,
            RequestStatus::Open | RequestStatus::Offered | RequestStatus::Confirmed
        )
    }

    /// No transition leaves this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Paid | RequestStatus::Cancelled)
    }

    /// Position along the forward path; `None` for `Cancelled`.
    pub fn progress(self) -> Option<u8> {
        match self {
            RequestStatus::Open => Some(0),
            RequestStatus::Offered => Some(1),
            RequestStatus::Confirmed => Some(2),
            RequestStatus::Complete => Some(3),
            RequestStatus::Paid => Some(4),
            RequestStatus::Cancelled => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Open => "OPEN",
            RequestStatus::Offered => "OFFERED",
            RequestStatus::Confirmed => "CONFIRMED",
            RequestStatus::Complete => "COMPLETE",
            RequestStatus::Paid => "PAID",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
