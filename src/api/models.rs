//! REST request and response bodies.

use crate::controllers::{ClusterInfo, ProduceRequest, ReplicaInfo};
use crate::error::{GatewayError, Result};
use crate::types::{Acl, AclSpec, BrokerInfo, ProduceResult, TopicMetadata};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmbeddedFormat {
    #[default]
    Json,
    Binary,
    String,
}

/// A record key or value: `data` interpreted according to `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProduceRequestData {
    #[serde(rename = "type", default)]
    pub format: EmbeddedFormat,
    #[serde(default)]
    pub data: Value,
}

impl ProduceRequestData {
    pub fn to_bytes(&self, field: &str) -> Result<Option<Bytes>> {
        if self.data.is_null() {
            return Ok(None);
        }
        let bytes = match self.format {
            EmbeddedFormat::Json => serde_json::to_vec(&self.data)
                .map_err(|e| GatewayError::Validation(format!("{}: {}", field, e)))?,
            EmbeddedFormat::Binary => {
                let encoded = self.data.as_str().ok_or_else(|| {
                    GatewayError::Validation(format!("{} BINARY data must be a base64 string", field))
                })?;
                STANDARD.decode(encoded).map_err(|e| {
                    GatewayError::Validation(format!("{} is not valid base64: {}", field, e))
                })?
            }
            EmbeddedFormat::String => self
                .data
                .as_str()
                .ok_or_else(|| {
                    GatewayError::Validation(format!("{} STRING data must be a string", field))
                })?
                .as_bytes()
                .to_vec(),
        };
        Ok(Some(Bytes::from(bytes)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProduceRequestHeader {
    pub name: String,
    /// Base64 encoded.
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ProduceRequestBody {
    #[serde(default)]
    pub partition_id: Option<i32>,
    /// Older spelling of `partition_id`; setting both is rejected.
    #[serde(default)]
    pub partition: Option<i32>,
    #[serde(default)]
    pub headers: Vec<ProduceRequestHeader>,
    #[serde(default)]
    pub key: Option<ProduceRequestData>,
    #[serde(default)]
    pub value: Option<ProduceRequestData>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProduceRequestBody {
    pub fn into_request(self) -> Result<ProduceRequest> {
        let partition = match (self.partition_id, self.partition) {
            (Some(_), Some(_)) => {
                return Err(GatewayError::Validation(
                    "partition and partition_id cannot both be set".to_string(),
                ))
            }
            (partition_id, partition) => partition_id.or(partition),
        };

        let headers = self
            .headers
            .into_iter()
            .map(|header| {
                let value = match header.value {
                    Some(encoded) => Some(Bytes::from(STANDARD.decode(&encoded).map_err(|e| {
                        GatewayError::Validation(format!(
                            "header {} is not valid base64: {}",
                            header.name, e
                        ))
                    })?)),
                    None => None,
                };
                Ok((header.name, value))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ProduceRequest {
            partition,
            headers,
            key: match &self.key {
                Some(key) => key.to_bytes("key")?,
                None => None,
            },
            value: match &self.value {
                Some(value) => value.to_bytes("value")?,
                None => None,
            },
            timestamp: self.timestamp,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProduceBatchRequestEntry {
    pub id: String,
    #[serde(default)]
    pub partition_id: Option<i32>,
    #[serde(default)]
    pub partition: Option<i32>,
    #[serde(default)]
    pub headers: Vec<ProduceRequestHeader>,
    #[serde(default)]
    pub key: Option<ProduceRequestData>,
    #[serde(default)]
    pub value: Option<ProduceRequestData>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProduceBatchRequestEntry {
    pub fn into_parts(self) -> (String, ProduceRequestBody) {
        (
            self.id,
            ProduceRequestBody {
                partition_id: self.partition_id,
                partition: self.partition,
                headers: self.headers,
                key: self.key,
                value: self.value,
                timestamp: self.timestamp,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ProduceBatchRequest {
    #[serde(default)]
    pub entries: Vec<ProduceBatchRequestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceResponse {
    pub cluster_id: String,
    pub topic_name: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: DateTime<Utc>,
    pub key_size: usize,
    pub value_size: usize,
}

impl ProduceResponse {
    pub fn new(cluster_id: &str, topic_name: &str, result: ProduceResult) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            topic_name: topic_name.to_string(),
            partition: result.partition,
            offset: result.offset,
            timestamp: result.timestamp,
            key_size: result.serialized_key_size,
            value_size: result.serialized_value_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceBatchSuccess {
    pub id: String,
    #[serde(flatten)]
    pub result: ProduceResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceBatchFailure {
    pub id: String,
    pub error_code: u16,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProduceBatchResponse {
    pub successes: Vec<ProduceBatchSuccess>,
    pub failures: Vec<ProduceBatchFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CreateTopicRequest {
    #[serde(default)]
    pub topic_name: Option<String>,
    #[serde(default)]
    pub partitions_count: Option<u32>,
    #[serde(default)]
    pub replication_factor: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CreateAclBatchRequest {
    #[serde(default)]
    pub data: Option<Vec<AclSpec>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: u16,
    pub message: String,
}

/// Collection envelope shared by every list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerData {
    pub cluster_id: String,
    pub broker_id: i32,
    pub host: String,
    pub port: u16,
    pub rack: Option<String>,
}

impl BrokerData {
    pub fn new(cluster_id: &str, broker: BrokerInfo) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            broker_id: broker.id,
            host: broker.host,
            port: broker.port,
            rack: broker.rack,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterData {
    pub cluster_id: String,
    pub controller: Option<BrokerData>,
}

impl From<ClusterInfo> for ClusterData {
    fn from(info: ClusterInfo) -> Self {
        let controller = info
            .controller
            .map(|broker| BrokerData::new(&info.cluster_id, broker));
        Self {
            cluster_id: info.cluster_id,
            controller,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicData {
    pub cluster_id: String,
    pub topic_name: String,
    pub is_internal: bool,
    pub replication_factor: u32,
    pub partitions_count: usize,
}

impl TopicData {
    pub fn new(cluster_id: &str, topic: TopicMetadata) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            partitions_count: topic.partitions.len(),
            topic_name: topic.name,
            is_internal: topic.internal,
            replication_factor: topic.replication_factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaData {
    pub cluster_id: String,
    pub topic_name: String,
    pub partition_id: i32,
    pub broker_id: i32,
    pub is_leader: bool,
    pub is_in_sync: bool,
    pub resource_name: String,
}

impl ReplicaData {
    pub fn new(cluster_id: &str, replica: ReplicaInfo) -> Self {
        let resource_name = format!(
            "crn:///kafka={}/topic={}/partition={}/replica={}",
            cluster_id, replica.topic_name, replica.partition_id, replica.broker_id
        );
        Self {
            cluster_id: cluster_id.to_string(),
            topic_name: replica.topic_name,
            partition_id: replica.partition_id,
            broker_id: replica.broker_id,
            is_leader: replica.is_leader,
            is_in_sync: replica.is_in_sync,
            resource_name,
        }
    }
}

pub type AclList = ListResponse<Acl>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> ProduceRequestBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_payload_formats() {
        let request = body(json!({
            "partition": 1,
            "key": { "type": "STRING", "data": "user-1" },
            "value": { "data": { "amount": 12.5, "items": [1, 2] } },
        }))
        .into_request()
        .unwrap();

        assert_eq!(request.partition, Some(1));
        assert_eq!(request.key, Some(Bytes::from_static(b"user-1")));
        assert_eq!(
            request.value,
            Some(Bytes::from_static(br#"{"amount":12.5,"items":[1,2]}"#))
        );

        let binary = body(json!({ "value": { "type": "BINARY", "data": "aGVsbG8=" } }))
            .into_request()
            .unwrap();
        assert_eq!(binary.value, Some(Bytes::from_static(b"hello")));
        assert_eq!(binary.key, None);
    }

    #[test]
    fn test_partition_spellings() {
        let request = body(json!({ "partition_id": 2 })).into_request().unwrap();
        assert_eq!(request.partition, Some(2));

        let both = body(json!({ "partition": 1, "partition_id": 1 })).into_request();
        match both {
            Err(GatewayError::Validation(message)) => {
                assert!(message.contains("partition and partition_id"))
            }
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_null_data_is_null_record_part() {
        let request = body(json!({ "key": { "data": null }, "value": {} }))
            .into_request()
            .unwrap();
        assert_eq!(request.key, None);
        assert_eq!(request.value, None);
    }

    #[test]
    fn test_headers_are_base64_and_ordered() {
        let request = body(json!({
            "headers": [
                { "name": "trace", "value": "YWJj" },
                { "name": "empty" },
                { "name": "trace", "value": "ZGVm" },
            ],
        }))
        .into_request()
        .unwrap();

        assert_eq!(
            request.headers,
            vec![
                ("trace".to_string(), Some(Bytes::from_static(b"abc"))),
                ("empty".to_string(), None),
                ("trace".to_string(), Some(Bytes::from_static(b"def"))),
            ]
        );
    }

    #[test]
    fn test_invalid_payload_parts() {
        let cases = [
            json!({ "value": { "type": "BINARY", "data": "not base64!" } }),
            json!({ "value": { "type": "BINARY", "data": 12 } }),
            json!({ "key": { "type": "STRING", "data": [1] } }),
            json!({ "headers": [{ "name": "h", "value": "%%%" }] }),
        ];
        for case in cases {
            assert!(matches!(
                body(case).into_request(),
                Err(GatewayError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_replica_resource_name() {
        let replica = ReplicaData::new(
            "cluster-1",
            ReplicaInfo {
                topic_name: "topic-1".to_string(),
                partition_id: 2,
                broker_id: 3,
                is_leader: true,
                is_in_sync: true,
            },
        );
        assert_eq!(
            replica.resource_name,
            "crn:///kafka=cluster-1/topic=topic-1/partition=2/replica=3"
        );
    }
}
