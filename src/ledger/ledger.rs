use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use crate::error::{RideError, RideResult};
use crate::request::{Request, RequestStatus};

use super::{Offer, OfferId};

/// A ledger-level change, checked and applied under the write lock.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Change<'a> {
    Offer(&'a str),
    Confirm(&'a str),
    Close(RequestStatus),
}

#[derive(Clone, Debug, Default)]
struct LedgerEntry {
    drivers: BTreeSet<String>,
    confirmed: Option<String>,
    closed: Option<RequestStatus>,
    /// Latest committed state of the request, once the ledger is tracking it.
    head: Option<Request>,
}

impl LedgerEntry {
    /// The status an offer would be refused under, if any.
    fn refusing_status(&self) -> Option<RequestStatus> {
        if let Some(status) = self.closed {
            return Some(status);
        }
        self.confirmed.as_ref().map(|_| RequestStatus::Confirmed)
    }

    fn apply(&mut self, request_id: &str, change: Change<'_>) -> RideResult<()> {
        match change {
            Change::Offer(driver) => self.admit(request_id, driver),
            Change::Confirm(driver) => self.confirm(request_id, driver),
            Change::Close(status) => {
                self.closed = Some(status);
                Ok(())
            }
        }
    }

    fn admit(&mut self, request_id: &str, driver: &str) -> RideResult<()> {
        if let Some(status) = self.refusing_status() {
            return Err(RideError::InvalidTransition {
                request_id: request_id.to_string(),
                status,
                operation: "accept an offer on",
            });
        }
        if !self.drivers.insert(driver.to_string()) {
            return Err(RideError::DuplicateOffer {
                request_id: request_id.to_string(),
                driver: driver.to_string(),
            });
        }
        Ok(())
    }

    fn confirm(&mut self, request_id: &str, driver: &str) -> RideResult<()> {
        if let Some(status) = self.closed {
            return Err(RideError::InvalidTransition {
                request_id: request_id.to_string(),
                status,
                operation: "confirm a driver on",
            });
        }
        if let Some(confirmed) = &self.confirmed {
            return Err(RideError::AlreadyConfirmed {
                request_id: request_id.to_string(),
                confirmed: confirmed.clone(),
            });
        }
        if !self.drivers.contains(driver) {
            return Err(RideError::UnknownOffer {
                request_id: request_id.to_string(),
                driver: driver.to_string(),
            });
        }
        self.confirmed = Some(driver.to_string());
        Ok(())
    }
}

/// Which drivers offered on which requests, and who was confirmed.
///
/// Purely additive apart from the confirmed-driver slot, which is written
/// once under the write lock and never changes afterwards. For requests it
/// tracks, the ledger also holds the latest committed [`Request`]; every
/// caller's copy converges on it. Clones share the same underlying table.
#[derive(Clone, Debug, Default)]
pub struct OfferLedger {
    entries: Arc<RwLock<HashMap<String, LedgerEntry>>>,
}

impl OfferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an offer. Fails if the pair exists or the request stopped taking offers.
    pub fn add(&self, request_id: &str, driver: &str) -> RideResult<OfferId> {
        self.update(request_id, |entry| entry.apply(request_id, Change::Offer(driver)))?;
        Ok(Offer::id_for(request_id, driver))
    }

    pub fn offers_for(&self, request_id: &str) -> RideResult<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RideError::LockPoisoned("offer ledger read"))?;
        Ok(entries
            .get(request_id)
            .map(|entry| entry.drivers.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Request ids this driver holds an offer on, sorted.
    pub fn offers_by_driver(&self, driver: &str) -> RideResult<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RideError::LockPoisoned("offer ledger read"))?;
        let mut requests: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.drivers.contains(driver))
            .map(|(request_id, _)| request_id.clone())
            .collect();
        requests.sort();
        Ok(requests)
    }

    pub fn confirmed_driver(&self, request_id: &str) -> RideResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RideError::LockPoisoned("offer ledger read"))?;
        Ok(entries
            .get(request_id)
            .and_then(|entry| entry.confirmed.clone()))
    }

    /// Compare-and-set the confirmed slot from empty to `driver`.
    ///
    /// Of any number of concurrent callers exactly one succeeds; the rest
    /// see [`RideError::AlreadyConfirmed`] naming the winner.
    pub fn confirm(&self, request_id: &str, driver: &str) -> RideResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RideError::LockPoisoned("offer ledger write"))?;
        let entry = entries
            .get_mut(request_id)
            .ok_or_else(|| RideError::UnknownOffer {
                request_id: request_id.to_string(),
                driver: driver.to_string(),
            })?;
        let mut next = entry.clone();
        next.apply(request_id, Change::Confirm(driver))?;
        *entry = next;
        Ok(())
    }

    /// Stop accepting offers and confirmations; `status` is reported to later callers.
    pub fn close(&self, request_id: &str, status: RequestStatus) -> RideResult<()> {
        self.update(request_id, |entry| entry.apply(request_id, Change::Close(status)))
            .map(|_| ())
    }

    /// The latest committed copy of a tracked request.
    pub fn head(&self, request_id: &str) -> RideResult<Option<Request>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RideError::LockPoisoned("offer ledger read"))?;
        Ok(entries
            .get(request_id)
            .and_then(|entry| entry.head.clone()))
    }

    /// Seed the ledger from a request loaded elsewhere (e.g. from the store).
    ///
    /// The request becomes the tracked head unless a newer version is already held.
    pub fn adopt(&self, request: &Request) -> RideResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RideError::LockPoisoned("offer ledger write"))?;
        let entry = entries.entry(request.id().to_string()).or_default();
        entry
            .drivers
            .extend(request.offering_drivers().iter().cloned());
        if entry.confirmed.is_none() {
            entry.confirmed = request.confirmed_driver().map(str::to_string);
        }
        if request.status().is_terminal() || request.status() == RequestStatus::Complete {
            entry.closed = Some(request.status());
        }
        let newer = entry
            .head
            .as_ref()
            .map_or(true, |head| head.entity.version() < request.entity.version());
        if newer {
            entry.head = Some(request.clone());
        }
        Ok(())
    }

    /// Check `change` and apply `transition` to the tracked head in one step.
    ///
    /// Nothing is written unless both succeed. Returns the new head, or
    /// `None` when the request is not tracked.
    pub(crate) fn commit<F>(
        &self,
        request_id: &str,
        change: Change<'_>,
        transition: F,
    ) -> RideResult<Option<Request>>
    where
        F: FnOnce(&mut Request) -> RideResult<()>,
    {
        self.update(request_id, |entry| {
            entry.apply(request_id, change)?;
            match entry.head.as_mut() {
                Some(head) => transition(head),
                None => Ok(()),
            }
        })
    }

    fn update<F>(&self, request_id: &str, change: F) -> RideResult<Option<Request>>
    where
        F: FnOnce(&mut LedgerEntry) -> RideResult<()>,
    {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RideError::LockPoisoned("offer ledger write"))?;
        let entry = entries.entry(request_id.to_string()).or_default();
        let mut next = entry.clone();
        change(&mut next)?;
        *entry = next;
        Ok(entry.head.clone())
    }
}
