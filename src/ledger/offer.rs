use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::store::Record;

/// `"{request_id}:{driver}"`; unique because a driver offers once per request.
pub type OfferId = String;

/// A driver's standing offer on one request. Never mutated once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub request_id: String,
    pub driver: String,
    pub created_at: SystemTime,
}

impl Offer {
    pub fn new(request_id: impl Into<String>, driver: impl Into<String>) -> Self {
        let request_id = request_id.into();
        let driver = driver.into();
        Offer {
            id: Offer::id_for(&request_id, &driver),
            request_id,
            driver,
            created_at: SystemTime::now(),
        }
    }

    pub fn id_for(request_id: &str, driver: &str) -> OfferId {
        format!("{}:{}", request_id, driver)
    }
}

impl Record for Offer {
    const COLLECTION: &'static str = "offers";

    fn record_id(&self) -> &str {
        &self.id
    }
}
