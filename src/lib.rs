mod aggregate;
mod config;
mod entity;
mod error;
mod ledger;
mod lifecycle;
mod notification;
mod reconcile;
mod repository;
mod request;
mod task;

pub mod observability;
pub mod store;

pub use aggregate::{hydrate, Aggregate};
pub use config::{CarrierConfig, ConfigError, DEFAULT_RECONCILE_ATTEMPTS, DEFAULT_RECONCILE_BACKOFF};
pub use entity::{Entity, EventRecord, Payload, PayloadError};
pub use error::{RideError, RideResult};
pub use ledger::{Offer, OfferId, OfferLedger};
pub use lifecycle::RequestLifecycle;
pub use notification::{
    display_order, sort_notifications, FeedCache, Notification, NotificationKind,
    NotificationService, RECIPIENT_FIELD,
};
pub use reconcile::{Reconciled, Reconciler};
pub use repository::RequestRepository;
pub use request::{Location, Request, RequestDraft, RequestRecord, RequestStatus, UNESTIMATED_FARE};
pub use store::{
    AlwaysOnline, Connectivity, DocumentStore, DocumentStoreExt, InMemoryDocumentStore,
    QueryWindow, Record, RecordId, StoreError,
};
pub use task::spawn_best_effort;

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
