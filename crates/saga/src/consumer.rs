//! Partition consumer driving the SAGA listener.

use std::sync::Arc;

use futures_util::StreamExt;
use message_log::{MessageLog, MessageLogExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ConsumerConfig;
use crate::error::Result;
use crate::listener::{ListenerOutcome, SagaListener};
use crate::topics;

/// Reads the inbound topics and feeds each record to the listener.
///
/// Every partition gets its own task; records of one partition are handled
/// strictly in offset order. An offset is committed only after its record
/// was handled. A failing record is retried with capped exponential backoff
/// and blocks the records behind it on that partition.
pub struct SagaConsumer {
    log: Arc<dyn MessageLog>,
    listener: Arc<SagaListener>,
    config: ConsumerConfig,
}

impl SagaConsumer {
    pub fn new(
        log: Arc<dyn MessageLog>,
        listener: Arc<SagaListener>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            log,
            listener,
            config,
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Spawns one task per inbound partition. Tasks stop once `shutdown`
    /// turns true or its sender is dropped.
    pub async fn spawn(
        self: Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();
        for topic in topics::INBOUND {
            let partitions = self.log.partition_count(topic).await?;
            for partition in 0..partitions {
                let consumer = Arc::clone(&self);
                let shutdown = shutdown.clone();
                handles.push(tokio::spawn(async move {
                    consumer.run_partition(topic, partition, shutdown).await;
                }));
            }
        }
        tracing::info!(
            group = %self.config.group,
            tasks = handles.len(),
            "saga consumer started"
        );
        Ok(handles)
    }

    /// Handles one batch from a partition.
    ///
    /// Returns how many records were handled and committed. Stops at the
    /// first failing record, leaving it uncommitted.
    pub async fn poll_partition(&self, topic: &str, partition: u32) -> Result<usize> {
        let mut records = self
            .log
            .fetch(&self.config.group, topic, partition, self.config.batch_size)
            .await?;

        let mut handled = 0;
        while let Some(record) = records.next().await {
            let record = record?;
            match self.listener.handle(&record).await {
                Ok(outcome) => {
                    let label = record.topic.clone();
                    match outcome {
                        ListenerOutcome::Processed => {
                            metrics::counter!("saga_messages_processed_total", "topic" => label)
                                .increment(1);
                        }
                        ListenerOutcome::Duplicate | ListenerOutcome::Skipped(_) => {
                            metrics::counter!("saga_messages_skipped_total", "topic" => label)
                                .increment(1);
                        }
                    }
                    self.log.commit_record(&self.config.group, &record).await?;
                    handled += 1;
                }
                Err(e) => {
                    metrics::counter!("saga_messages_failed_total", "topic" => record.topic.clone())
                        .increment(1);
                    tracing::error!(
                        topic,
                        partition,
                        offset = %record.offset,
                        error = %e,
                        "saga message processing failed, not committing"
                    );
                    return Err(e);
                }
            }
        }
        Ok(handled)
    }

    async fn run_partition(
        &self,
        topic: &'static str,
        partition: u32,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::debug!(topic, partition, "partition consumer started");
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.poll_partition(topic, partition).await {
                Ok(0) => {
                    failures = 0;
                    self.config.poll_interval
                }
                Ok(_) => {
                    failures = 0;
                    continue;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let backoff = self.config.backoff(failures);
                    tracing::warn!(
                        topic,
                        partition,
                        attempt = failures,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "retrying partition after backoff"
                    );
                    backoff
                }
            };

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        tracing::debug!(topic, partition, "partition consumer stopped");
    }
}
