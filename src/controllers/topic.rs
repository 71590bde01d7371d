//! Topic creation and deletion through the broker admin client.

use crate::broker::TopicAdmin;
use crate::completion::{completion, CompletionHandle};
use crate::error::{GatewayError, Result};
use crate::types::{NewTopic, TopicMetadata};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_PARTITIONS_COUNT: u32 = 1;
pub const DEFAULT_REPLICATION_FACTOR: u32 = 1;

#[derive(Clone)]
pub struct TopicManager {
    admin: Arc<dyn TopicAdmin>,
}

impl TopicManager {
    pub fn new(admin: Arc<dyn TopicAdmin>) -> Self {
        Self { admin }
    }

    /// Validates the request locally; broker-side failures (duplicate name, too few
    /// brokers) arrive through the returned handle.
    pub fn create_topic(
        &self,
        topic_name: Option<String>,
        partitions_count: Option<u32>,
        replication_factor: Option<u32>,
    ) -> Result<CompletionHandle<TopicMetadata>> {
        let name = match topic_name {
            Some(name) if !name.trim().is_empty() => name,
            Some(_) => {
                return Err(GatewayError::Validation(
                    "topic_name must not be empty".to_string(),
                ))
            }
            None => return Err(GatewayError::Validation("topic_name is required".to_string())),
        };
        let topic = NewTopic {
            name,
            partitions_count: positive(
                partitions_count,
                DEFAULT_PARTITIONS_COUNT,
                "partitions_count",
            )?,
            replication_factor: positive(
                replication_factor,
                DEFAULT_REPLICATION_FACTOR,
                "replication_factor",
            )?,
        };

        info!(
            "Creating topic {} ({} partitions, replication factor {})",
            topic.name, topic.partitions_count, topic.replication_factor
        );
        let (handle, completer) = completion();
        let admin = self.admin.clone();
        tokio::spawn(async move {
            let result = admin.create_topic(topic).await;
            if let Err(error) = &result {
                warn!("Topic creation failed: {}", error);
            }
            completer.complete(result);
        });
        Ok(handle)
    }

    pub fn delete_topic(&self, topic_name: &str) -> CompletionHandle<()> {
        info!("Deleting topic {}", topic_name);
        let (handle, completer) = completion();
        let admin = self.admin.clone();
        let name = topic_name.to_string();
        tokio::spawn(async move {
            completer.complete(admin.delete_topic(&name).await);
        });
        handle
    }
}

fn positive(value: Option<u32>, default: u32, field: &str) -> Result<u32> {
    match value {
        None => Ok(default),
        Some(0) => Err(GatewayError::Validation(format!(
            "{} must be greater than 0",
            field
        ))),
        Some(value) => Ok(value),
    }
}
