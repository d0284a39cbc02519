use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde::Serialize;

use crate::{Offset, OutgoingMessage, Record, RecordMetadata, Result};

/// A stream of records read from one partition.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<Record>> + Send>>;

/// Core trait for message log implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Appends a message to the partition selected by its key.
    ///
    /// Returns the partition and offset the message was written at.
    async fn publish(&self, message: OutgoingMessage) -> Result<RecordMetadata>;

    /// Number of partitions of a topic.
    async fn partition_count(&self, topic: &str) -> Result<u32>;

    /// Reads up to `max` records starting at the group's committed offset.
    ///
    /// Reading does not move the committed offset: uncommitted records are
    /// returned again by the next fetch.
    async fn fetch(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        max: usize,
    ) -> Result<RecordStream>;

    /// Stores `next` as the next offset the group will read.
    ///
    /// Commits never move backwards.
    async fn commit(&self, group: &str, topic: &str, partition: u32, next: Offset) -> Result<()>;

    /// Returns the next offset the group will read.
    async fn committed(&self, group: &str, topic: &str, partition: u32) -> Result<Offset>;
}

/// Extension trait providing convenience methods for message logs.
#[async_trait]
pub trait MessageLogExt: MessageLog {
    /// Serializes `payload` and publishes it.
    async fn publish_json<T: Serialize + Sync>(
        &self,
        topic: &str,
        key: &str,
        payload: &T,
    ) -> Result<RecordMetadata> {
        let message = OutgoingMessage::json(topic, key, payload)?;
        self.publish(message).await
    }

    /// Commits the offset right after `record`.
    async fn commit_record(&self, group: &str, record: &Record) -> Result<()> {
        self.commit(group, &record.topic, record.partition, record.offset.next())
            .await
    }
}

impl<T: MessageLog + ?Sized> MessageLogExt for T {}

/// Picks the partition for `key`.
///
/// Uses 32-bit FNV-1a so the mapping is stable across processes and builds.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    if partitions == 0 {
        return 0;
    }
    let mut hash: u32 = 0x811c_9dc5;
    for byte in key.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash % partitions
}
