//! InMemoryDocumentStore - an eventually-consistent store for tests and local runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

use super::{Connectivity, DocumentStore, QueryWindow, RecordId, StoreError};
use crate::config::CarrierConfig;

/// Page size the hosted search store enforces per query.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

struct StoredDocument {
    body: Value,
    visible_at: Instant,
    hidden_at: Option<Instant>,
}

impl StoredDocument {
    fn is_live(&self) -> bool {
        self.hidden_at.is_none()
    }

    fn is_visible(&self, now: Instant) -> bool {
        self.visible_at <= now && self.hidden_at.map_or(true, |hidden| now < hidden)
    }

    fn matches(&self, field: &str, value: &Value) -> bool {
        self.body.get(field) == Some(value)
    }
}

#[derive(Default)]
struct Collection {
    documents: BTreeMap<u64, StoredDocument>,
    ids: HashMap<String, u64>,
}

impl Collection {
    fn purge_hidden(&mut self, now: Instant) {
        self.documents
            .retain(|_, doc| doc.hidden_at.map_or(true, |hidden| now < hidden));
    }
}

struct Shared {
    collections: RwLock<HashMap<String, Collection>>,
    sequence: AtomicU64,
    reachable: AtomicBool,
    page_limit: usize,
    visibility_lag: Duration,
}

/// In-memory document store backed by a `HashMap` of insertion-ordered collections.
///
/// Writes are authoritative immediately but only become visible to queries
/// after `visibility_lag`; deleted records likewise linger in query results
/// for the same lag. Clone-friendly via `Arc`: clones share storage.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    shared: Arc<Shared>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Read-after-write consistent store with the default page limit.
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_PAGE_LIMIT, Duration::ZERO)
    }

    /// Store whose writes take `lag` to show up in queries.
    pub fn lagging(lag: Duration) -> Self {
        Self::with_settings(DEFAULT_PAGE_LIMIT, lag)
    }

    /// Read-after-write consistent store paging by `config.page_limit`.
    pub fn from_config(config: &CarrierConfig) -> Self {
        Self::with_settings(config.page_limit, Duration::ZERO)
    }

    pub fn with_settings(page_limit: usize, visibility_lag: Duration) -> Self {
        InMemoryDocumentStore {
            shared: Arc::new(Shared {
                collections: RwLock::new(HashMap::new()),
                sequence: AtomicU64::new(1),
                reachable: AtomicBool::new(true),
                page_limit: page_limit.max(1),
                visibility_lag,
            }),
        }
    }

    /// Simulate losing (or regaining) the network.
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Live records in a collection, visible to queries or not.
    pub fn live_count(&self, collection: &str) -> Result<usize, StoreError> {
        let collections = self
            .shared
            .collections
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;
        Ok(collections.get(collection).map_or(0, |c| {
            c.documents.values().filter(|doc| doc.is_live()).count()
        }))
    }

    fn ensure_reachable(&self) -> Result<(), StoreError> {
        if self.shared.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store marked unreachable".into()))
        }
    }
}

impl Connectivity for InMemoryDocumentStore {
    fn is_reachable(&self) -> bool {
        self.shared.reachable.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn page_limit(&self) -> usize {
        self.shared.page_limit
    }

    async fn insert(&self, collection: &str, mut record: Value) -> Result<RecordId, StoreError> {
        self.ensure_reachable()?;
        let object = record.as_object_mut().ok_or_else(|| {
            StoreError::Serialization(format!("{} records must be JSON objects", collection))
        })?;
        let id = match object.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = Uuid::new_v4().to_string();
                object.insert("id".into(), Value::String(id.clone()));
                id
            }
        };

        let now = Instant::now();
        let mut collections = self
            .shared
            .collections
            .write()
            .map_err(|_| StoreError::LockPoisoned("insert"))?;
        let entry = collections.entry(collection.to_string()).or_default();
        entry.purge_hidden(now);

        if let Some(seq) = entry.ids.get(&id).copied() {
            if let Some(existing) = entry.documents.get_mut(&seq) {
                existing.body = record;
                return Ok(id);
            }
        }

        let seq = self.shared.sequence.fetch_add(1, Ordering::Relaxed);
        entry.ids.insert(id.clone(), seq);
        entry.documents.insert(
            seq,
            StoredDocument {
                body: record,
                visible_at: now + self.shared.visibility_lag,
                hidden_at: None,
            },
        );
        Ok(id)
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        window: QueryWindow,
    ) -> Result<Vec<Value>, StoreError> {
        self.ensure_reachable()?;
        let now = Instant::now();
        let collections = self
            .shared
            .collections
            .read()
            .map_err(|_| StoreError::LockPoisoned("query"))?;
        let Some(entry) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let limit = window.limit.min(self.shared.page_limit);
        Ok(entry
            .documents
            .values()
            .filter(|doc| doc.is_visible(now) && doc.matches(field, value))
            .skip(window.offset)
            .take(limit)
            .map(|doc| doc.body.clone())
            .collect())
    }

    async fn update_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        self.ensure_reachable()?;
        let mut collections = self
            .shared
            .collections
            .write()
            .map_err(|_| StoreError::LockPoisoned("update"))?;
        let not_found = || StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };

        let entry = collections.get_mut(collection).ok_or_else(not_found)?;
        let seq = entry.ids.get(id).copied().ok_or_else(not_found)?;
        let document = entry
            .documents
            .get_mut(&seq)
            .filter(|doc| doc.is_live())
            .ok_or_else(not_found)?;
        match document.body.as_object_mut() {
            Some(object) => {
                object.insert(field.to_string(), value);
                Ok(())
            }
            None => Err(StoreError::Serialization(format!(
                "{}/{} is not a JSON object",
                collection, id
            ))),
        }
    }

    async fn delete_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<usize, StoreError> {
        self.ensure_reachable()?;
        let now = Instant::now();
        let hidden_at = now + self.shared.visibility_lag;
        let mut collections = self
            .shared
            .collections
            .write()
            .map_err(|_| StoreError::LockPoisoned("delete"))?;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };
        entry.purge_hidden(now);

        let mut deleted = Vec::new();
        for (seq, doc) in entry.documents.iter_mut() {
            if deleted.len() >= self.shared.page_limit {
                break;
            }
            if doc.is_live() && doc.matches(field, value) {
                doc.hidden_at = Some(hidden_at);
                deleted.push(*seq);
            }
        }

        entry.ids.retain(|_, seq| !deleted.contains(seq));
        if self.shared.visibility_lag.is_zero() {
            entry.purge_hidden(now);
        }
        Ok(deleted.len())
    }
}
