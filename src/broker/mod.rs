//! Broker client seams consumed by the gateway.
//!
//! The gateway never owns a broker connection; it is handed long-lived, thread-safe
//! implementations of these traits at construction time.

pub mod memory;

pub use memory::{InMemoryBroker, TopicSpec};

use crate::error::BrokerError;
use crate::types::{
    Acl, AclFilter, BrokerInfo, ClusterId, NewTopic, ProducerRecord, RecordMetadata, TopicMetadata,
};
use async_trait::async_trait;

/// Invoked exactly once per `send`, possibly on a broker-client thread.
pub type SendCallback =
    Box<dyn FnOnce(std::result::Result<RecordMetadata, BrokerError>) + Send + 'static>;

/// Callback-based record writer.
pub trait RecordProducer: Send + Sync {
    /// Submit `record`; the outcome is reported through `callback`. Retries, batching and
    /// partition selection for records without an explicit partition are the
    /// implementation's concern.
    fn send(&self, record: ProducerRecord, callback: SendCallback);
}

#[async_trait]
pub trait AclAdmin: Send + Sync {
    /// Create all entries as one batch.
    async fn create_acls(&self, acls: Vec<Acl>) -> std::result::Result<(), BrokerError>;

    async fn describe_acls(&self, filter: AclFilter) -> std::result::Result<Vec<Acl>, BrokerError>;
}

#[async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Returns the metadata of the topic as created.
    async fn create_topic(&self, topic: NewTopic) -> std::result::Result<TopicMetadata, BrokerError>;

    async fn delete_topic(&self, name: &str) -> std::result::Result<(), BrokerError>;
}

/// Read-only cluster metadata, computed elsewhere.
pub trait ClusterMetadata: Send + Sync {
    fn cluster_id(&self) -> ClusterId;
    fn controller(&self) -> Option<BrokerInfo>;
    fn brokers(&self) -> Vec<BrokerInfo>;
    fn topics(&self) -> Vec<TopicMetadata>;
}
