use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de, de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("could not encode {event} payload: {message}")]
    Encode { event: String, message: String },
    #[error("could not decode {event} payload: {message}")]
    Decode { event: String, message: String },
}

/// Bitcode bytes, carried as base64 text in JSON documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map(Payload).map_err(de::Error::custom)
    }
}

/// One entry in an aggregate's history. Sequences start at 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub name: String,
    pub sequence: u64,
    pub recorded_at: SystemTime,
    pub payload: Payload,
}

impl EventRecord {
    pub fn encode<T: Serialize + ?Sized>(
        name: impl Into<String>,
        payload: &T,
        sequence: u64,
    ) -> Result<Self, PayloadError> {
        let name = name.into();
        let bytes = bitcode::serialize(payload).map_err(|err| PayloadError::Encode {
            event: name.clone(),
            message: err.to_string(),
        })?;
        Ok(EventRecord {
            name,
            sequence,
            recorded_at: SystemTime::now(),
            payload: Payload(bytes),
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        bitcode::deserialize(self.payload.as_bytes()).map_err(|err| PayloadError::Decode {
            event: self.name.clone(),
            message: err.to_string(),
        })
    }
}
