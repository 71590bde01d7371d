use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Failure reported by the broker client through a send or admin completion.
///
/// This is the only error that travels across a [`crate::completion::CompletionHandle`],
/// so it is cheap to clone: every observer of a failed operation gets its own copy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("This server does not host this topic-partition: topic={topic}, partition={partition:?}")]
    UnknownTopicOrPartition {
        topic: String,
        partition: Option<i32>,
    },

    #[error("Not leader or follower for partition {topic}-{partition}")]
    NotLeaderOrFollower { topic: String, partition: i32 },

    #[error("Broker operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Record too large: {size} bytes, max allowed: {max_size} bytes")]
    RecordTooLarge { size: usize, max_size: usize },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Topic '{0}' already exists")]
    TopicAlreadyExists(String),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Security features are disabled: {0}")]
    SecurityDisabled(String),

    #[error("Broker not available: {0}")]
    BrokerNotAvailable(String),

    #[error("Unknown broker error: {0}")]
    Unknown(String),
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Payload error. {0}")]
    InvalidPayload(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Broker not found: {0}")]
    BrokerNotFound(i32),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Request timed out waiting for the broker")]
    RequestTimeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
