use thiserror::Error;

/// Failures reported by a document store adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the round-trip.
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    /// No live record with this id exists in the collection.
    #[error("record {id} not found in {collection}")]
    NotFound { collection: String, id: String },
    /// A record could not be encoded to or decoded from its document form.
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
