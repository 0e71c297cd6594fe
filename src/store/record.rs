//! Typed records on top of the JSON document contract.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::{DocumentStore, QueryWindow, RecordId, StoreError};

/// A type persisted as one document in a named collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    fn record_id(&self) -> &str;
}

/// Typed and multi-page helpers available on every [`DocumentStore`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Serialize and insert a record into its collection.
    async fn insert_record<R: Record>(&self, record: &R) -> Result<RecordId, StoreError> {
        let document = serde_json::to_value(record)?;
        self.insert(R::COLLECTION, document).await
    }

    /// One page of typed records. Documents that no longer decode are skipped.
    async fn query_page<R: Record>(
        &self,
        field: &str,
        value: &Value,
        window: QueryWindow,
    ) -> Result<Vec<R>, StoreError> {
        let documents = self
            .query_by_field(R::COLLECTION, field, value, window)
            .await?;
        Ok(decode_documents(R::COLLECTION, documents))
    }

    /// Every matching record, paging until a round comes back short.
    async fn query_all<R: Record>(&self, field: &str, value: &Value) -> Result<Vec<R>, StoreError> {
        let mut window = QueryWindow::first(self.page_limit().max(1));
        let mut records = Vec::new();
        loop {
            let page = self
                .query_by_field(R::COLLECTION, field, value, window)
                .await?;
            let fetched = page.len();
            records.extend(decode_documents::<R>(R::COLLECTION, page));
            if fetched < window.limit {
                break;
            }
            window = window.next();
        }
        Ok(records)
    }

    /// Delete every matching record, repeating until a round deletes less than a page.
    async fn delete_all(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<usize, StoreError> {
        let limit = self.page_limit().max(1);
        let mut total = 0;
        loop {
            let deleted = self.delete_by_field(collection, field, value).await?;
            total += deleted;
            if deleted < limit {
                break;
            }
        }
        Ok(total)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

fn decode_documents<R: Record>(collection: &str, documents: Vec<Value>) -> Vec<R> {
    documents
        .into_iter()
        .filter_map(|document| match serde_json::from_value::<R>(document) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(collection, error = %err, "skipping undecodable document");
                None
            }
        })
        .collect()
}
