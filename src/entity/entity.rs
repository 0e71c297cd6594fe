use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::{EventRecord, PayloadError};

/// Identity, version, and ordered event history shared by every aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    id: String,
    version: u64,
    events: Vec<EventRecord>,
    #[serde(skip, default)]
    replaying: bool,
    timestamp: SystemTime,
}

impl Default for Entity {
    fn default() -> Self {
        Entity {
            id: String::new(),
            version: 0,
            events: Vec::new(),
            replaying: false,
            timestamp: SystemTime::now(),
        }
    }
}

impl Entity {
    pub fn new() -> Self {
        Entity::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let mut entity = Entity::default();
        entity.id = id.into();
        entity
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Time of the last recorded event (or of creation).
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Record an event with a serializable payload.
    ///
    /// Encoding happens before anything is appended, so a failed digest
    /// leaves the history untouched. Ignored while replaying.
    pub fn digest<T: Serialize + ?Sized>(
        &mut self,
        name: impl Into<String>,
        payload: &T,
    ) -> Result<(), PayloadError> {
        if self.replaying {
            return Ok(());
        }

        let sequence = self.events.len() as u64 + 1;
        let record = EventRecord::encode(name, payload, sequence)?;
        self.timestamp = record.recorded_at;
        self.events.push(record);
        self.version = self.events.len() as u64;
        Ok(())
    }

    pub fn load_from_history(&mut self, history: Vec<EventRecord>) {
        self.events = history;
        self.version = self.events.len() as u64;
        if let Some(last) = self.events.last() {
            self.timestamp = last.recorded_at;
        }
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }
}
