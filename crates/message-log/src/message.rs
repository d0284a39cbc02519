use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EventId;

/// Position of a record within one partition. Starts at 0.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Offset(i64);

impl Offset {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Offset of the first record in a partition.
    pub fn earliest() -> Self {
        Self(0)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message waiting to be published.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub event_id: EventId,
    pub topic: String,
    /// Partitioning key. Messages with the same key keep their relative order.
    pub key: String,
    pub payload: serde_json::Value,
    pub headers: HashMap<String, String>,
}

impl OutgoingMessage {
    pub fn new(
        topic: impl Into<String>,
        key: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            topic: topic.into(),
            key: key.into(),
            payload,
            headers: HashMap::new(),
        }
    }

    /// Serializes `payload` into a new message.
    pub fn json<T: Serialize>(
        topic: impl Into<String>,
        key: impl Into<String>,
        payload: &T,
    ) -> crate::Result<Self> {
        Ok(Self::new(topic, key, serde_json::to_value(payload)?))
    }

    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// A message as stored in, and read back from, a partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub event_id: EventId,
    pub topic: String,
    pub partition: u32,
    pub offset: Offset,
    pub key: String,
    /// When the log accepted the message.
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub headers: HashMap<String, String>,
}

impl Record {
    /// Deserializes the payload into `T`.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Where a published message landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: u32,
    pub offset: Offset,
}
