//! Durable, partitioned publish/subscribe log.
//!
//! Messages are appended to a topic partition chosen from their key, so all
//! messages sharing a key are totally ordered. Consumers read per partition
//! from their group's committed offset and commit explicitly once a message
//! has been fully processed.

pub mod error;
pub mod memory;
pub mod message;
pub mod store;

pub use common::EventId;
pub use error::{MessageLogError, Result};
pub use store::{MessageLog, MessageLogExt, RecordStream, partition_for};
pub use memory::InMemoryMessageLog;
pub use message::{Offset, OutgoingMessage, Record, RecordMetadata};
