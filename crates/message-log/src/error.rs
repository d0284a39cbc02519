use thiserror::Error;

/// Errors that can occur when interacting with the message log.
#[derive(Debug, Error)]
pub enum MessageLogError {
    /// The topic has not been created.
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// The partition does not exist for the topic.
    #[error("Unknown partition {partition} for topic {topic}")]
    UnknownPartition { topic: String, partition: u32 },

    /// The broker refused or could not take the request.
    #[error("Message log unavailable: {0}")]
    Unavailable(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for message log operations.
pub type Result<T> = std::result::Result<T, MessageLogError>;
