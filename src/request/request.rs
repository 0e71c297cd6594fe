use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::aggregate::{hydrate, Aggregate};
use crate::entity::{Entity, EventRecord};
use crate::error::{RideError, RideResult};
use crate::store::Record;

use super::draft::validate_fields;
use super::{Location, RequestDraft, RequestStatus};

#[derive(Serialize, Deserialize)]
struct Opened {
    id: String,
    rider: String,
    start: Option<Location>,
    end: Option<Location>,
    description: String,
    fare_cents: i64,
}

/// A rider's posted trip, event-sourced through its [`Entity`].
///
/// Every transition checks its guard before recording anything: a rejected
/// call leaves both the state and the history untouched.
#[derive(Clone, Debug, Default)]
pub struct Request {
    pub entity: Entity,
    rider: String,
    start: Option<Location>,
    end: Option<Location>,
    description: String,
    fare_cents: i64,
    status: RequestStatus,
    offering_drivers: BTreeSet<String>,
    confirmed_driver: Option<String>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a draft and open it under `id`.
    pub fn open(id: impl Into<String>, draft: RequestDraft) -> RideResult<Self> {
        draft.validate()?;
        let mut request = Request::new();
        request.initialize(
            id.into(),
            draft.rider,
            draft.start,
            draft.end,
            draft.description,
            draft.fare_cents,
        )?;
        Ok(request)
    }

    pub fn id(&self) -> &str {
        self.entity.id()
    }

    pub fn rider(&self) -> &str {
        &self.rider
    }

    pub fn start(&self) -> Option<&Location> {
        self.start.as_ref()
    }

    pub fn end(&self) -> Option<&Location> {
        self.end.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn fare_cents(&self) -> i64 {
        self.fare_cents
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn offering_drivers(&self) -> &BTreeSet<String> {
        &self.offering_drivers
    }

    pub fn has_offer_from(&self, driver: &str) -> bool {
        self.offering_drivers.contains(driver)
    }

    pub fn confirmed_driver(&self) -> Option<&str> {
        self.confirmed_driver.as_deref()
    }

    /// Re-check the creation guard against the current fields.
    pub fn validate(&self) -> RideResult<()> {
        validate_fields(self.start.as_ref(), self.end.as_ref(), self.fare_cents)
    }

    // === Commands ===

    fn initialize(
        &mut self,
        id: String,
        rider: String,
        start: Option<Location>,
        end: Option<Location>,
        description: String,
        fare_cents: i64,
    ) -> RideResult<()> {
        let opened = Opened {
            id,
            rider,
            start,
            end,
            description,
            fare_cents,
        };
        self.entity.digest("RequestOpened", &opened)?;
        self.entity.set_id(opened.id);
        self.rider = opened.rider;
        self.start = opened.start;
        self.end = opened.end;
        self.description = opened.description;
        self.fare_cents = opened.fare_cents;
        self.status = RequestStatus::Open;
        Ok(())
    }

    /// Register `driver`'s offer; the first offer moves `Open` to `Offered`.
    pub fn submit_offer(&mut self, driver: &str) -> RideResult<()> {
        if !self.status.accepts_offers() {
            return Err(self.invalid("accept an offer on"));
        }
        if self.offering_drivers.contains(driver) {
            return Err(RideError::DuplicateOffer {
                request_id: self.id().to_string(),
                driver: driver.to_string(),
            });
        }

        self.entity.digest("OfferSubmitted", driver)?;
        self.offering_drivers.insert(driver.to_string());
        self.status = RequestStatus::Offered;
        Ok(())
    }

    /// Accept `driver`, who must already hold an offer on this request.
    ///
    /// `Open` is tolerated here, but the offer check still applies, so in
    /// practice a confirm always follows a real offer.
    pub fn confirm_driver(&mut self, driver: &str) -> RideResult<()> {
        if matches!(
            self.status,
            RequestStatus::Complete | RequestStatus::Paid | RequestStatus::Cancelled
        ) {
            return Err(self.invalid("confirm a driver on"));
        }
        if let Some(confirmed) = &self.confirmed_driver {
            return Err(RideError::AlreadyConfirmed {
                request_id: self.id().to_string(),
                confirmed: confirmed.clone(),
            });
        }
        if !self.offering_drivers.contains(driver) {
            return Err(RideError::UnknownOffer {
                request_id: self.id().to_string(),
                driver: driver.to_string(),
            });
        }

        self.entity.digest("DriverConfirmed", driver)?;
        self.confirmed_driver = Some(driver.to_string());
        self.status = RequestStatus::Confirmed;
        Ok(())
    }

    pub fn complete(&mut self) -> RideResult<()> {
        if self.status != RequestStatus::Confirmed {
            return Err(self.invalid("complete"));
        }
        self.entity.digest("RequestCompleted", &())?;
        self.status = RequestStatus::Complete;
        Ok(())
    }

    pub fn pay(&mut self) -> RideResult<()> {
        if self.status != RequestStatus::Complete {
            return Err(self.invalid("pay for"));
        }
        self.entity.digest("RequestPaid", &())?;
        self.status = RequestStatus::Paid;
        Ok(())
    }

    pub fn cancel(&mut self) -> RideResult<()> {
        if !self.status.can_cancel() {
            return Err(self.invalid("cancel"));
        }
        self.entity.digest("RequestCancelled", &())?;
        self.status = RequestStatus::Cancelled;
        Ok(())
    }

    fn invalid(&self, operation: &'static str) -> RideError {
        RideError::InvalidTransition {
            request_id: self.id().to_string(),
            status: self.status,
            operation,
        }
    }

    // === Replay ===

    fn apply(&mut self, event: &EventRecord) -> RideResult<()> {
        match event.name.as_str() {
            "RequestOpened" => {
                let opened: Opened = event.decode()?;
                self.initialize(
                    opened.id,
                    opened.rider,
                    opened.start,
                    opened.end,
                    opened.description,
                    opened.fare_cents,
                )
            }
            "OfferSubmitted" => {
                let driver: String = event.decode()?;
                self.submit_offer(&driver)
            }
            "DriverConfirmed" => {
                let driver: String = event.decode()?;
                self.confirm_driver(&driver)
            }
            "RequestCompleted" => self.complete(),
            "RequestPaid" => self.pay(),
            "RequestCancelled" => self.cancel(),
            other => Err(RideError::History(format!("unknown request event {}", other))),
        }
    }

    /// Rebuild a request from a recorded history.
    pub fn replay(id: impl Into<String>, history: Vec<EventRecord>) -> RideResult<Self> {
        let mut entity = Entity::with_id(id);
        entity.load_from_history(history);
        hydrate(entity)
    }

    /// The document form written to the `requests` collection.
    pub fn to_record(&self) -> RequestRecord {
        RequestRecord {
            id: self.id().to_string(),
            rider: self.rider.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            description: self.description.clone(),
            fare_cents: self.fare_cents,
            status: self.status,
            offering_drivers: self.offering_drivers.iter().cloned().collect(),
            confirmed_driver: self.confirmed_driver.clone(),
            history: self.entity.events().to_vec(),
        }
    }

    /// Restore from a stored document, preferring its history when present.
    pub fn from_record(record: RequestRecord) -> RideResult<Self> {
        if !record.history.is_empty() {
            return Request::replay(record.id, record.history);
        }

        let mut request = Request::new();
        request.entity.set_id(record.id);
        request.rider = record.rider;
        request.start = record.start;
        request.end = record.end;
        request.description = record.description;
        request.fare_cents = record.fare_cents;
        request.status = record.status;
        request.offering_drivers = record.offering_drivers.into_iter().collect();
        request.confirmed_driver = record.confirmed_driver;
        Ok(request)
    }
}

impl Aggregate for Request {
    type ReplayError = RideError;

    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    fn replay_event(&mut self, event: &EventRecord) -> Result<(), Self::ReplayError> {
        self.apply(event)
    }
}

/// Stored snapshot of a request, queryable by `rider`, `status`, and `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: String,
    pub rider: String,
    pub start: Option<Location>,
    pub end: Option<Location>,
    #[serde(default)]
    pub description: String,
    pub fare_cents: i64,
    pub status: RequestStatus,
    #[serde(default)]
    pub offering_drivers: Vec<String>,
    #[serde(default)]
    pub confirmed_driver: Option<String>,
    #[serde(default)]
    pub history: Vec<EventRecord>,
}

impl Record for RequestRecord {
    const COLLECTION: &'static str = "requests";

    fn record_id(&self) -> &str {
        &self.id
    }
}
