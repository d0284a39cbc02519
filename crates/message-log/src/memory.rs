use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    MessageLogError, Offset, OutgoingMessage, Record, RecordMetadata, Result,
    store::{MessageLog, RecordStream, partition_for},
};

type GroupPartition = (String, String, u32);

#[derive(Default)]
struct LogState {
    /// Topic name to its partitions, each an ordered list of records.
    topics: HashMap<String, Vec<Vec<Record>>>,
    /// (group, topic, partition) to the next offset the group will read.
    committed: HashMap<GroupPartition, Offset>,
}

/// In-memory message log for tests and single-process deployments.
///
/// Topics are created on first publish with the default partition count.
#[derive(Clone)]
pub struct InMemoryMessageLog {
    state: Arc<RwLock<LogState>>,
    default_partitions: u32,
    fail_on_publish: Arc<AtomicBool>,
}

impl Default for InMemoryMessageLog {
    fn default() -> Self {
        Self::new(1)
    }
}

impl InMemoryMessageLog {
    /// Creates an empty log whose topics get `default_partitions` partitions.
    pub fn new(default_partitions: u32) -> Self {
        Self {
            state: Arc::new(RwLock::new(LogState::default())),
            default_partitions: default_partitions.max(1),
            fail_on_publish: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a topic with an explicit partition count. No-op if it exists.
    pub async fn create_topic(&self, topic: &str, partitions: u32) {
        let mut state = self.state.write().await;
        let created = state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions.max(1) as usize]);
        tracing::debug!(topic, partitions = created.len(), "topic ready");
    }

    /// Makes every subsequent publish fail until reset.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Returns every record of a topic, partition by partition.
    pub async fn records(&self, topic: &str) -> Vec<Record> {
        let state = self.state.read().await;
        state
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of records in a topic.
    pub async fn record_count(&self, topic: &str) -> usize {
        let state = self.state.read().await;
        state
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageLog for InMemoryMessageLog {
    async fn publish(&self, message: OutgoingMessage) -> Result<RecordMetadata> {
        if self.fail_on_publish.load(Ordering::SeqCst) {
            tracing::warn!(topic = %message.topic, key = %message.key, "publish rejected");
            return Err(MessageLogError::Unavailable(
                "publishing disabled".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let partitions = state
            .topics
            .entry(message.topic.clone())
            .or_insert_with(|| vec![Vec::new(); self.default_partitions as usize]);

        let partition = partition_for(&message.key, partitions.len() as u32);
        let records = &mut partitions[partition as usize];
        let offset = Offset::new(records.len() as i64);

        records.push(Record {
            event_id: message.event_id,
            topic: message.topic.clone(),
            partition,
            offset,
            key: message.key,
            timestamp: Utc::now(),
            payload: message.payload,
            headers: message.headers,
        });

        tracing::trace!(topic = %message.topic, partition, %offset, "record appended");
        Ok(RecordMetadata {
            topic: message.topic,
            partition,
            offset,
        })
    }

    async fn partition_count(&self, topic: &str) -> Result<u32> {
        let state = self.state.read().await;
        Ok(state
            .topics
            .get(topic)
            .map(|p| p.len() as u32)
            .unwrap_or(self.default_partitions))
    }

    async fn fetch(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        max: usize,
    ) -> Result<RecordStream> {
        use futures_util::stream;

        let state = self.state.read().await;
        let Some(partitions) = state.topics.get(topic) else {
            if partition < self.default_partitions {
                return Ok(Box::pin(stream::empty()));
            }
            return Err(MessageLogError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            });
        };
        let records = partitions
            .get(partition as usize)
            .ok_or_else(|| MessageLogError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            })?;

        let start = state
            .committed
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
            .unwrap_or_default()
            .as_i64() as usize;

        let batch: Vec<Record> = records.iter().skip(start).take(max).cloned().collect();
        Ok(Box::pin(stream::iter(batch.into_iter().map(Ok))))
    }

    async fn commit(&self, group: &str, topic: &str, partition: u32, next: Offset) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state
            .committed
            .entry((group.to_string(), topic.to_string(), partition))
            .or_default();
        if next > *entry {
            *entry = next;
        }
        Ok(())
    }

    async fn committed(&self, group: &str, topic: &str, partition: u32) -> Result<Offset> {
        let state = self.state.read().await;
        Ok(state
            .committed
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
            .unwrap_or_default())
    }
}
