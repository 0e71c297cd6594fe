use serde::{Deserialize, Serialize};

use crate::error::{RideError, RideResult};

/// Fare value meaning "no estimate has been made yet".
pub const UNESTIMATED_FARE: i64 = -1;

/// A picked point on the map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub label: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Location {
            latitude,
            longitude,
            label: None,
        }
    }

    pub fn labelled(latitude: f64, longitude: f64, label: impl Into<String>) -> Self {
        Location {
            latitude,
            longitude,
            label: Some(label.into()),
        }
    }
}

/// What a rider fills in before posting a request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestDraft {
    pub rider: String,
    pub start: Option<Location>,
    pub end: Option<Location>,
    pub description: String,
    /// Estimated fare in cents, or [`UNESTIMATED_FARE`].
    pub fare_cents: i64,
}

impl RequestDraft {
    pub fn new(rider: impl Into<String>) -> Self {
        RequestDraft {
            rider: rider.into(),
            start: None,
            end: None,
            description: String::new(),
            fare_cents: UNESTIMATED_FARE,
        }
    }

    pub fn from_to(mut self, start: Location, end: Location) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn fare(mut self, cents: i64) -> Self {
        self.fare_cents = cents;
        self
    }

    /// Checks the creation guard: both endpoints picked and a fare estimated.
    pub fn validate(&self) -> RideResult<()> {
        validate_fields(self.start.as_ref(), self.end.as_ref(), self.fare_cents)
    }
}

pub(crate) fn validate_fields(
    start: Option<&Location>,
    end: Option<&Location>,
    fare_cents: i64,
) -> RideResult<()> {
    if start.is_none() {
        return Err(RideError::Validation {
            field: "start",
            message: "you must first select a start and end location",
        });
    }
    if end.is_none() {
        return Err(RideError::Validation {
            field: "end",
            message: "you must first select a start and end location",
        });
    }
    if fare_cents < 0 {
        return Err(RideError::Validation {
            field: "fare",
            message: "you must first estimate the fare",
        });
    }
    Ok(())
}
