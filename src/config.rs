use crate::access::AccessRuleSet;
use crate::error::GatewayError;
use crate::types::TimestampType;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub access: AccessConfig,
    pub producer: ProducerConfig,
    pub cluster: ClusterConfig,
    /// Default tracing filter; `RUST_LOG` takes precedence when set.
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8082".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> crate::Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            GatewayError::InvalidConfig(format!(
                "server.listen is not a valid socket address: {}",
                self.listen
            ))
        })
    }
}

/// Endpoint allow/block lists, each a comma-separated list of resource-name patterns.
/// An empty list places no restriction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub allowlist: String,
    pub blocklist: String,
}

impl AccessConfig {
    pub fn rule_set(&self) -> crate::Result<AccessRuleSet> {
        AccessRuleSet::from_lists(&self.allowlist, &self.blocklist)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// How long a produce may wait for the broker before it is cancelled. 0 waits forever.
    pub request_timeout_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
        }
    }
}

impl ProducerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

/// Layout of the embedded broker the proxy binary serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub cluster_id: String,
    pub max_record_bytes: usize,
    pub brokers: Vec<BrokerEntry>,
    pub topics: Vec<TopicEntry>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_id: "rustmq-cluster".to_string(),
            max_record_bytes: 1024 * 1024,
            brokers: vec![BrokerEntry {
                id: 1,
                host: "localhost".to_string(),
                port: 9092,
                rack: None,
            }],
            topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerEntry {
    pub id: i32,
    pub host: String,
    pub port: u16,
    pub rack: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicEntry {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u32,
    #[serde(default)]
    pub timestamp_type: TimestampType,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            access: AccessConfig::default(),
            producer: ProducerConfig::default(),
            cluster: ClusterConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Request bodies may be this many times the largest record, covering JSON and base64
/// expansion of the payload.
const BODY_BYTES_PER_RECORD_BYTE: u64 = 4;

impl Config {
    /// Largest request body the REST layer buffers.
    pub fn max_body_bytes(&self) -> u64 {
        (self.cluster.max_record_bytes as u64).saturating_mul(BODY_BYTES_PER_RECORD_BYTE)
    }

    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| GatewayError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.server.listen_addr()?;

        // compiles both lists, rejecting malformed patterns
        self.access.rule_set()?;

        if self.cluster.cluster_id.is_empty() {
            return Err(GatewayError::InvalidConfig(
                "cluster.cluster_id cannot be empty".to_string(),
            ));
        }

        if self.cluster.max_record_bytes == 0 {
            return Err(GatewayError::InvalidConfig(
                "cluster.max_record_bytes must be greater than 0".to_string(),
            ));
        }

        if self.cluster.brokers.is_empty() {
            return Err(GatewayError::InvalidConfig(
                "cluster.brokers must list at least one broker".to_string(),
            ));
        }

        for topic in &self.cluster.topics {
            if topic.name.is_empty() {
                return Err(GatewayError::InvalidConfig(
                    "cluster.topics name cannot be empty".to_string(),
                ));
            }
            if topic.partitions == 0 {
                return Err(GatewayError::InvalidConfig(format!(
                    "cluster.topics.{} partitions must be greater than 0",
                    topic.name
                )));
            }
            if topic.replication_factor == 0
                || topic.replication_factor as usize > self.cluster.brokers.len()
            {
                return Err(GatewayError::InvalidConfig(format!(
                    "cluster.topics.{} replication_factor must be between 1 and the broker count",
                    topic.name
                )));
            }
        }

        Ok(())
    }
}
