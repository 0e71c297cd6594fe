//! DocumentStore - the minimum contract the core needs from the remote store.

use async_trait::async_trait;
use serde_json::Value;

use super::StoreError;

/// Identity assigned to a record by the store (or supplied by the client).
pub type RecordId = String;

/// Offset/limit window for paged reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    /// The first page of `limit` records.
    pub fn first(limit: usize) -> Self {
        QueryWindow { limit, offset: 0 }
    }

    /// The page directly after this one.
    pub fn next(self) -> Self {
        QueryWindow {
            limit: self.limit,
            offset: self.offset + self.limit,
        }
    }
}

/// Eventually-consistent keyed-record store.
///
/// Nothing written through this trait is guaranteed to be visible to a
/// query issued immediately afterwards. Every read is bounded by
/// [`page_limit`](DocumentStore::page_limit); callers that may need more
/// records page through with [`QueryWindow`] (see `DocumentStoreExt`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Maximum number of records a single query or delete round touches.
    fn page_limit(&self) -> usize;

    /// Insert a JSON object. An `"id"` string field is honored as the record
    /// id; otherwise the store assigns one and writes it back into the record.
    async fn insert(&self, collection: &str, record: Value) -> Result<RecordId, StoreError>;

    /// Records whose `field` equals `value`, in store order, clamped to the page limit.
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        window: QueryWindow,
    ) -> Result<Vec<Value>, StoreError>;

    /// Set one field on one record.
    async fn update_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError>;

    /// Delete up to one page of records whose `field` equals `value`.
    /// Returns how many were deleted; a full page means more may remain.
    async fn delete_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<usize, StoreError>;
}
