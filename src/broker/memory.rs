//! In-process broker
//!
//! Backs the proxy binary when no external cluster is wired in, and every test in the
//! crate. Writes are appended synchronously so offsets are assigned in submission order
//! per partition; acknowledgements are delivered on a dedicated I/O thread, the same way a
//! networked client completes sends off the caller's thread.

use super::{AclAdmin, ClusterMetadata, RecordProducer, SendCallback, TopicAdmin};
use crate::error::BrokerError;
use crate::types::{
    Acl, AclFilter, BrokerId, BrokerInfo, ClusterId, NewTopic, Offset, PartitionId,
    PartitionMetadata, ProducerRecord, RecordMetadata, TimestampType, TopicMetadata,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, warn};

type Delivery = Box<dyn FnOnce() + Send + 'static>;

/// Topic layout for [`InMemoryBroker::add_topic`].
#[derive(Debug, Clone)]
pub struct TopicSpec {
    pub name: String,
    /// Replica broker ids per partition; the first entry is the leader.
    pub assignments: Vec<Vec<BrokerId>>,
    pub timestamp_type: TimestampType,
}

impl TopicSpec {
    /// Spread `partitions` partitions across `brokers` round-robin.
    pub fn spread(
        name: impl Into<String>,
        partitions: u32,
        replication_factor: u32,
        brokers: &[BrokerId],
    ) -> Self {
        let replication = (replication_factor as usize).min(brokers.len()).max(1);
        let assignments = (0..partitions as usize)
            .map(|p| {
                (0..replication)
                    .filter_map(|r| brokers.get((p + r) % brokers.len().max(1)).copied())
                    .collect()
            })
            .collect();
        Self {
            name: name.into(),
            assignments,
            timestamp_type: TimestampType::CreateTime,
        }
    }

    pub fn with_timestamp_type(mut self, timestamp_type: TimestampType) -> Self {
        self.timestamp_type = timestamp_type;
        self
    }
}

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub offset: Offset,
    pub record: ProducerRecord,
}

#[derive(Debug)]
struct PartitionLog {
    replicas: Vec<BrokerId>,
    records: Vec<StoredRecord>,
}

#[derive(Debug)]
struct TopicLog {
    timestamp_type: TimestampType,
    partitions: Vec<PartitionLog>,
}

impl TopicLog {
    fn from_spec(spec: TopicSpec) -> (String, Self) {
        let partitions = spec
            .assignments
            .into_iter()
            .map(|replicas| PartitionLog {
                replicas,
                records: Vec::new(),
            })
            .collect();
        (
            spec.name,
            TopicLog {
                timestamp_type: spec.timestamp_type,
                partitions,
            },
        )
    }

    fn metadata(&self, name: &str) -> TopicMetadata {
        let partitions: Vec<PartitionMetadata> = self
            .partitions
            .iter()
            .enumerate()
            .map(|(id, log)| PartitionMetadata {
                partition_id: id as PartitionId,
                leader: log.replicas.first().copied(),
                replicas: log.replicas.clone(),
                in_sync_replicas: log.replicas.clone(),
            })
            .collect();
        TopicMetadata {
            name: name.to_string(),
            internal: name.starts_with("__"),
            replication_factor: partitions
                .first()
                .map(|p| p.replicas.len() as u32)
                .unwrap_or(0),
            partitions,
        }
    }
}

pub struct InMemoryBroker {
    cluster_id: ClusterId,
    brokers: RwLock<Vec<BrokerInfo>>,
    topics: DashMap<String, TopicLog>,
    acls: RwLock<Vec<Acl>>,
    acl_authorizer_enabled: bool,
    max_record_bytes: usize,
    round_robin: AtomicU32,
    send_calls: AtomicU64,
    acl_calls: AtomicU64,
    injected_send_failure: Mutex<Option<BrokerError>>,
    io: Mutex<Option<mpsc::Sender<Delivery>>>,
    io_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl InMemoryBroker {
    pub fn new(cluster_id: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel::<Delivery>();
        let io_thread = thread::Builder::new()
            .name("rustmq-broker-io".to_string())
            .spawn(move || {
                for delivery in rx {
                    delivery();
                }
            })
            .ok();
        if io_thread.is_none() {
            warn!("Failed to spawn broker I/O thread, acknowledgements will be delivered inline");
        }

        Self {
            cluster_id: cluster_id.into(),
            brokers: RwLock::new(Vec::new()),
            topics: DashMap::new(),
            acls: RwLock::new(Vec::new()),
            acl_authorizer_enabled: true,
            max_record_bytes: 1024 * 1024,
            round_robin: AtomicU32::new(0),
            send_calls: AtomicU64::new(0),
            acl_calls: AtomicU64::new(0),
            injected_send_failure: Mutex::new(None),
            io: Mutex::new(io_thread.as_ref().map(|_| tx)),
            io_thread: Mutex::new(io_thread),
        }
    }

    pub fn with_max_record_bytes(mut self, max_record_bytes: usize) -> Self {
        self.max_record_bytes = max_record_bytes;
        self
    }

    /// Reject ACL operations, as a cluster without an authorizer does.
    pub fn without_authorizer(mut self) -> Self {
        self.acl_authorizer_enabled = false;
        self
    }

    pub fn add_broker(&self, broker: BrokerInfo) {
        let mut brokers = self.brokers.write();
        brokers.retain(|b| b.id != broker.id);
        brokers.push(broker);
        brokers.sort_by_key(|b| b.id);
    }

    /// Registers `spec`, replacing any topic of the same name.
    pub fn add_topic(&self, spec: TopicSpec) {
        debug!("Creating in-memory topic {}", spec.name);
        let (name, log) = TopicLog::from_spec(spec);
        self.topics.insert(name, log);
    }

    /// Fail the next `send` with `error`.
    pub fn inject_send_failure(&self, error: BrokerError) {
        *self.injected_send_failure.lock() = Some(error);
    }

    pub fn send_calls(&self) -> u64 {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn acl_calls(&self) -> u64 {
        self.acl_calls.load(Ordering::SeqCst)
    }

    pub fn acls(&self) -> Vec<Acl> {
        self.acls.read().clone()
    }

    pub fn records(&self, topic: &str, partition: PartitionId) -> Vec<StoredRecord> {
        self.topics
            .get(topic)
            .and_then(|t| {
                usize::try_from(partition)
                    .ok()
                    .and_then(|p| t.partitions.get(p).map(|p| p.records.clone()))
            })
            .unwrap_or_default()
    }

    fn append(&self, record: ProducerRecord) -> Result<RecordMetadata, BrokerError> {
        if let Some(error) = self.injected_send_failure.lock().take() {
            return Err(error);
        }

        let size = record.serialized_size();
        if size > self.max_record_bytes {
            return Err(BrokerError::RecordTooLarge {
                size,
                max_size: self.max_record_bytes,
            });
        }

        let mut topic = self
            .topics
            .get_mut(&record.topic)
            .ok_or_else(|| BrokerError::UnknownTopicOrPartition {
                topic: record.topic.clone(),
                partition: record.partition,
            })?;

        let partition_count = topic.partitions.len() as u32;
        if partition_count == 0 {
            return Err(BrokerError::UnknownTopicOrPartition {
                topic: record.topic.clone(),
                partition: record.partition,
            });
        }

        let partition = match record.partition {
            Some(p) if p >= 0 && (p as u32) < partition_count => p as u32,
            Some(p) => {
                return Err(BrokerError::UnknownTopicOrPartition {
                    topic: record.topic.clone(),
                    partition: Some(p),
                })
            }
            None => match &record.key {
                Some(key) => crc32fast::hash(key) % partition_count,
                None => self.round_robin.fetch_add(1, Ordering::Relaxed) % partition_count,
            },
        };

        let timestamp = match topic.timestamp_type {
            TimestampType::CreateTime => Some(record.timestamp),
            TimestampType::LogAppendTime => None,
        };

        let log = &mut topic.partitions[partition as usize];
        if log.replicas.is_empty() {
            return Err(BrokerError::NotLeaderOrFollower {
                topic: record.topic.clone(),
                partition: partition as PartitionId,
            });
        }
        let offset = log.records.len() as Offset;
        let metadata = RecordMetadata {
            topic: record.topic.clone(),
            partition: partition as PartitionId,
            offset,
            timestamp,
            serialized_key_size: record.serialized_key_size(),
            serialized_value_size: record.serialized_value_size(),
        };
        log.records.push(StoredRecord { offset, record });
        Ok(metadata)
    }

    fn deliver(&self, delivery: Delivery) {
        let rejected = match self.io.lock().as_ref() {
            Some(tx) => tx.send(delivery).err().map(|e| e.0),
            None => Some(delivery),
        };
        if let Some(delivery) = rejected {
            delivery();
        }
    }
}

impl Drop for InMemoryBroker {
    fn drop(&mut self) {
        self.io.lock().take();
        if let Some(handle) = self.io_thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl RecordProducer for InMemoryBroker {
    fn send(&self, record: ProducerRecord, callback: SendCallback) {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.append(record);
        self.deliver(Box::new(move || callback(result)));
    }
}

#[async_trait]
impl AclAdmin for InMemoryBroker {
    async fn create_acls(&self, acls: Vec<Acl>) -> Result<(), BrokerError> {
        self.acl_calls.fetch_add(1, Ordering::SeqCst);
        if !self.acl_authorizer_enabled {
            return Err(BrokerError::SecurityDisabled(
                "No Authorizer is configured on the broker".to_string(),
            ));
        }

        let mut stored = self.acls.write();
        for acl in acls {
            if !stored.contains(&acl) {
                stored.push(acl);
            }
        }
        Ok(())
    }

    async fn describe_acls(&self, filter: AclFilter) -> Result<Vec<Acl>, BrokerError> {
        self.acl_calls.fetch_add(1, Ordering::SeqCst);
        if !self.acl_authorizer_enabled {
            return Err(BrokerError::SecurityDisabled(
                "No Authorizer is configured on the broker".to_string(),
            ));
        }
        Ok(self
            .acls
            .read()
            .iter()
            .filter(|acl| filter.matches(acl))
            .cloned()
            .collect())
    }
}

impl ClusterMetadata for InMemoryBroker {
    fn cluster_id(&self) -> ClusterId {
        self.cluster_id.clone()
    }

    fn controller(&self) -> Option<BrokerInfo> {
        self.brokers.read().first().cloned()
    }

    fn brokers(&self) -> Vec<BrokerInfo> {
        self.brokers.read().clone()
    }

    fn topics(&self) -> Vec<TopicMetadata> {
        let mut topics: Vec<TopicMetadata> = self
            .topics
            .iter()
            .map(|entry| entry.metadata(entry.key()))
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        topics
    }
}

#[async_trait]
impl TopicAdmin for InMemoryBroker {
    async fn create_topic(&self, topic: NewTopic) -> Result<TopicMetadata, BrokerError> {
        if topic.partitions_count == 0 {
            return Err(BrokerError::InvalidTopic(
                "Number of partitions must be larger than 0".to_string(),
            ));
        }
        let broker_ids: Vec<BrokerId> = self.brokers.read().iter().map(|b| b.id).collect();
        if topic.replication_factor == 0 || topic.replication_factor as usize > broker_ids.len() {
            return Err(BrokerError::InvalidTopic(format!(
                "Replication factor: {} larger than available brokers: {}",
                topic.replication_factor,
                broker_ids.len()
            )));
        }

        let spec = TopicSpec::spread(
            topic.name,
            topic.partitions_count,
            topic.replication_factor,
            &broker_ids,
        );
        match self.topics.entry(spec.name.clone()) {
            Entry::Occupied(entry) => Err(BrokerError::TopicAlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                let (name, log) = TopicLog::from_spec(spec);
                let metadata = log.metadata(&name);
                entry.insert(log);
                debug!("Created topic {} with {} partitions", name, metadata.partitions.len());
                Ok(metadata)
            }
        }
    }

    async fn delete_topic(&self, name: &str) -> Result<(), BrokerError> {
        match self.topics.remove(name) {
            Some(_) => {
                debug!("Deleted topic {}", name);
                Ok(())
            }
            None => Err(BrokerError::UnknownTopicOrPartition {
                topic: name.to_string(),
                partition: None,
            }),
        }
    }
}
