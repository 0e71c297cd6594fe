mod connectivity;
mod error;
mod in_memory;
mod record;
mod store;

pub use connectivity::{AlwaysOnline, Connectivity};
pub use error::StoreError;
pub use in_memory::{InMemoryDocumentStore, DEFAULT_PAGE_LIMIT};
pub use record::{DocumentStoreExt, Record};
pub use store::{DocumentStore, QueryWindow, RecordId};
