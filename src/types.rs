use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ClusterId = String;
pub type TopicName = String;
pub type PartitionId = i32;
pub type BrokerId = i32;
pub type Offset = i64;

/// Canonical name of the endpoint being invoked plus its HTTP verb.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    pub resource_name: String,
    pub http_method: String,
}

impl RequestIdentity {
    pub fn new(resource_name: impl Into<String>, http_method: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            http_method: http_method.into(),
        }
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.http_method, self.resource_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub name: String,
    pub value: Option<Bytes>,
}

/// Wire-level write request handed to the broker client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord {
    pub topic: TopicName,
    pub partition: Option<PartitionId>,
    pub timestamp: DateTime<Utc>,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    pub headers: Vec<RecordHeader>,
}

impl ProducerRecord {
    pub fn serialized_key_size(&self) -> usize {
        self.key.as_ref().map(|k| k.len()).unwrap_or(0)
    }

    pub fn serialized_value_size(&self) -> usize {
        self.value.as_ref().map(|v| v.len()).unwrap_or(0)
    }

    pub fn serialized_size(&self) -> usize {
        let headers: usize = self
            .headers
            .iter()
            .map(|h| h.name.len() + h.value.as_ref().map(|v| v.len()).unwrap_or(0))
            .sum();
        self.serialized_key_size() + self.serialized_value_size() + headers
    }
}

/// What the broker reports back for an acknowledged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: TopicName,
    pub partition: PartitionId,
    pub offset: Offset,
    /// `None` when the broker did not supply a log-append timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    pub serialized_key_size: usize,
    pub serialized_value_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceResult {
    pub partition: PartitionId,
    pub offset: Offset,
    pub timestamp: DateTime<Utc>,
    pub serialized_key_size: usize,
    pub serialized_value_size: usize,
}

impl ProduceResult {
    /// Builds the result from broker metadata, falling back to `observed_at` when the
    /// broker did not stamp the record.
    pub fn from_record_metadata(metadata: RecordMetadata, observed_at: DateTime<Utc>) -> Self {
        Self {
            partition: metadata.partition,
            offset: metadata.offset,
            timestamp: metadata.timestamp.unwrap_or(observed_at),
            serialized_key_size: metadata.serialized_key_size,
            serialized_value_size: metadata.serialized_value_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclResourceType {
    Any,
    Topic,
    Group,
    Cluster,
    TransactionalId,
    DelegationToken,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclPatternType {
    Any,
    Match,
    Literal,
    Prefixed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclOperation {
    Any,
    All,
    Read,
    Write,
    Create,
    Delete,
    Alter,
    Describe,
    ClusterAction,
    DescribeConfigs,
    AlterConfigs,
    IdempotentWrite,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclPermission {
    Any,
    Deny,
    Allow,
    #[serde(other)]
    Unknown,
}

/// Client-supplied ACL creation entry. Every field is required, but presence is checked
/// by validation so that the first offending entry can be reported precisely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclSpec {
    pub resource_type: Option<AclResourceType>,
    pub resource_name: Option<String>,
    pub pattern_type: Option<AclPatternType>,
    pub principal: Option<String>,
    pub host: Option<String>,
    pub operation: Option<AclOperation>,
    pub permission: Option<AclPermission>,
}

/// Broker-level access-control entry. A value object: two entries with the same fields
/// are the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Acl {
    pub cluster_id: ClusterId,
    pub resource_type: AclResourceType,
    pub resource_name: String,
    pub pattern_type: AclPatternType,
    pub principal: String,
    pub host: String,
    pub operation: AclOperation,
    pub permission: AclPermission,
}

/// Search filter over ACL entries. `None` fields and `ANY` values match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclFilter {
    pub resource_type: Option<AclResourceType>,
    pub resource_name: Option<String>,
    pub pattern_type: Option<AclPatternType>,
    pub principal: Option<String>,
    pub host: Option<String>,
    pub operation: Option<AclOperation>,
    pub permission: Option<AclPermission>,
}

impl AclFilter {
    pub fn matches(&self, acl: &Acl) -> bool {
        self.resource_type
            .map_or(true, |t| t == AclResourceType::Any || t == acl.resource_type)
            && self
                .resource_name
                .as_deref()
                .map_or(true, |n| n == acl.resource_name)
            && self
                .pattern_type
                .map_or(true, |p| p == AclPatternType::Any || p == acl.pattern_type)
            && self
                .principal
                .as_deref()
                .map_or(true, |p| p == acl.principal)
            && self.host.as_deref().map_or(true, |h| h == acl.host)
            && self
                .operation
                .map_or(true, |o| o == AclOperation::Any || o == acl.operation)
            && self
                .permission
                .map_or(true, |p| p == AclPermission::Any || p == acl.permission)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub id: BrokerId,
    pub host: String,
    pub port: u16,
    pub rack: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampType {
    CreateTime,
    LogAppendTime,
}

impl Default for TimestampType {
    fn default() -> Self {
        TimestampType::CreateTime
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMetadata {
    pub partition_id: PartitionId,
    pub leader: Option<BrokerId>,
    pub replicas: Vec<BrokerId>,
    pub in_sync_replicas: Vec<BrokerId>,
}

/// A topic to create through the admin client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTopic {
    pub name: TopicName,
    pub partitions_count: u32,
    pub replication_factor: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMetadata {
    pub name: TopicName,
    pub internal: bool,
    pub replication_factor: u32,
    pub partitions: Vec<PartitionMetadata>,
}
