use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{RideError, RideResult};
use crate::ledger::Offer;
use crate::request::{Request, RequestRecord, RequestStatus};
use crate::store::{DocumentStore, DocumentStoreExt, QueryWindow, Record};

/// Requests and offers as documents in the `requests` and `offers` collections.
///
/// Reads are only as fresh as the store: a request saved a moment ago may
/// not show up yet. Pair with a `Reconciler` where that matters.
#[derive(Clone)]
pub struct RequestRepository {
    store: Arc<dyn DocumentStore>,
}

impl RequestRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        RequestRepository { store }
    }

    /// Validate, then insert. An invalid request is never written.
    pub async fn add_request(&self, request: &Request) -> RideResult<String> {
        request.validate()?;
        let id = self.store.insert_record(&request.to_record()).await?;
        debug!(request_id = %id, rider = request.rider(), "request added");
        Ok(id)
    }

    /// Overwrite the stored snapshot (status, offers, confirmed driver, history).
    pub async fn save(&self, request: &Request) -> RideResult<()> {
        self.store.insert_record(&request.to_record()).await?;
        Ok(())
    }

    pub async fn record_offer(&self, offer: &Offer) -> RideResult<()> {
        self.store.insert_record(offer).await?;
        Ok(())
    }

    pub async fn get(&self, request_id: &str) -> RideResult<Option<Request>> {
        let records: Vec<RequestRecord> = self
            .store
            .query_page("id", &json!(request_id), QueryWindow::first(1))
            .await?;
        records.into_iter().next().map(Request::from_record).transpose()
    }

    /// All of `rider`'s requests, or only those in `statuses` when it is non-empty.
    pub async fn fetch_where_rider(
        &self,
        rider: &str,
        statuses: &[RequestStatus],
    ) -> RideResult<Vec<Request>> {
        let records: Vec<RequestRecord> = self.store.query_all("rider", &json!(rider)).await?;
        restore(
            records
                .into_iter()
                .filter(|record| statuses.is_empty() || statuses.contains(&record.status)),
        )
    }

    /// Requests `driver` holds an offer on, in offer order.
    pub async fn offered_requests(&self, driver: &str) -> RideResult<Vec<Request>> {
        let offers: Vec<Offer> = self.store.query_all("driver", &json!(driver)).await?;
        let mut seen = BTreeSet::new();
        let mut requests = Vec::new();
        for offer in offers {
            if !seen.insert(offer.request_id.clone()) {
                continue;
            }
            match self.get(&offer.request_id).await? {
                Some(request) => requests.push(request),
                None => warn!(
                    request_id = %offer.request_id,
                    driver,
                    "offer refers to a request the store does not show"
                ),
            }
        }
        Ok(requests)
    }

    /// Case-insensitive description match among requests still taking offers.
    pub async fn search_by_keyword(&self, keyword: &str) -> RideResult<Vec<Request>> {
        let needle = keyword.trim().to_lowercase();
        let mut matches = Vec::new();
        for status in [RequestStatus::Open, RequestStatus::Offered] {
            let records: Vec<RequestRecord> = self
                .store
                .query_all("status", &status_key(status)?)
                .await?;
            matches.extend(
                records
                    .into_iter()
                    .filter(|record| record.description.to_lowercase().contains(&needle)),
            );
        }
        restore(matches.into_iter())
    }

    /// Administrative reset of every request `rider` posted.
    pub async fn clear_rider_requests(&self, rider: &str) -> RideResult<usize> {
        let deleted = self
            .store
            .delete_all(RequestRecord::COLLECTION, "rider", &json!(rider))
            .await?;
        debug!(rider, deleted, "cleared rider requests");
        Ok(deleted)
    }

    /// Administrative reset of every offer `driver` made.
    pub async fn clear_driver_offers(&self, driver: &str) -> RideResult<usize> {
        let deleted = self
            .store
            .delete_all(Offer::COLLECTION, "driver", &json!(driver))
            .await?;
        debug!(driver, deleted, "cleared driver offers");
        Ok(deleted)
    }
}

fn status_key(status: RequestStatus) -> RideResult<Value> {
    serde_json::to_value(status).map_err(|err| RideError::History(err.to_string()))
}

fn restore(records: impl Iterator<Item = RequestRecord>) -> RideResult<Vec<Request>> {
    records.map(Request::from_record).collect()
}
