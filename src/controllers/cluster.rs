//! Read-only cluster queries over broker-supplied metadata.

use crate::broker::ClusterMetadata;
use crate::error::{GatewayError, Result};
use crate::types::{BrokerId, BrokerInfo, ClusterId, PartitionId, TopicMetadata, TopicName};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub cluster_id: ClusterId,
    pub controller: Option<BrokerInfo>,
}

/// One replica of a partition as hosted by a particular broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaInfo {
    pub topic_name: TopicName,
    pub partition_id: PartitionId,
    pub broker_id: BrokerId,
    pub is_leader: bool,
    pub is_in_sync: bool,
}

#[derive(Clone)]
pub struct ClusterQueryService {
    metadata: Arc<dyn ClusterMetadata>,
}

impl ClusterQueryService {
    pub fn new(metadata: Arc<dyn ClusterMetadata>) -> Self {
        Self { metadata }
    }

    pub fn list_clusters(&self) -> Vec<ClusterInfo> {
        vec![self.cluster_info()]
    }

    pub fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo> {
        self.check_cluster(cluster_id)?;
        Ok(self.cluster_info())
    }

    /// Fails with `ClusterNotFound` unless `cluster_id` is the cluster this gateway fronts.
    pub fn check_cluster(&self, cluster_id: &str) -> Result<()> {
        if self.metadata.cluster_id() == cluster_id {
            Ok(())
        } else {
            Err(GatewayError::ClusterNotFound(cluster_id.to_string()))
        }
    }

    pub fn list_topics(&self, cluster_id: &str) -> Result<Vec<TopicMetadata>> {
        self.check_cluster(cluster_id)?;
        Ok(self.metadata.topics())
    }

    pub fn get_topic(&self, cluster_id: &str, topic: &str) -> Result<TopicMetadata> {
        self.check_cluster(cluster_id)?;
        self.metadata
            .topics()
            .into_iter()
            .find(|t| t.name == topic)
            .ok_or_else(|| GatewayError::TopicNotFound(topic.to_string()))
    }

    pub fn list_brokers(&self, cluster_id: &str) -> Result<Vec<BrokerInfo>> {
        self.check_cluster(cluster_id)?;
        Ok(self.metadata.brokers())
    }

    pub fn search_replicas_by_broker(
        &self,
        cluster_id: &str,
        broker_id: BrokerId,
    ) -> Result<Vec<ReplicaInfo>> {
        self.check_cluster(cluster_id)?;
        if !self.metadata.brokers().iter().any(|b| b.id == broker_id) {
            return Err(GatewayError::BrokerNotFound(broker_id));
        }

        let mut replicas = Vec::new();
        for topic in self.metadata.topics() {
            for partition in &topic.partitions {
                if partition.replicas.contains(&broker_id) {
                    replicas.push(ReplicaInfo {
                        topic_name: topic.name.clone(),
                        partition_id: partition.partition_id,
                        broker_id,
                        is_leader: partition.leader == Some(broker_id),
                        is_in_sync: partition.in_sync_replicas.contains(&broker_id),
                    });
                }
            }
        }
        Ok(replicas)
    }

    fn cluster_info(&self) -> ClusterInfo {
        ClusterInfo {
            cluster_id: self.metadata.cluster_id(),
            controller: self.metadata.controller(),
        }
    }
}
