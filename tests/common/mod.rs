//! Shared fixtures for the REST proxy integration tests.

#![allow(dead_code)]

use rustmq_rest::access::{AccessControlGate, AccessRuleSet};
use rustmq_rest::api::ApiState;
use rustmq_rest::broker::{InMemoryBroker, TopicSpec};
use rustmq_rest::types::BrokerInfo;
use std::sync::Arc;

pub const CLUSTER_ID: &str = "cluster-1";

/// Three brokers and a three-partition `topic-1`.
pub fn broker() -> Arc<InMemoryBroker> {
    let broker = InMemoryBroker::new(CLUSTER_ID);
    for id in 1..=3 {
        broker.add_broker(BrokerInfo {
            id,
            host: format!("broker-{}", id),
            port: 9092,
            rack: Some(format!("rack-{}", id)),
        });
    }
    broker.add_topic(TopicSpec::spread("topic-1", 3, 3, &[1, 2, 3]));
    Arc::new(broker)
}

pub fn state_with(broker: Arc<InMemoryBroker>, allowlist: &str, blocklist: &str) -> ApiState {
    let rules = AccessRuleSet::from_lists(allowlist, blocklist).unwrap();
    ApiState::with_broker(AccessControlGate::new(rules), broker, None).unwrap()
}

pub fn open_state(broker: Arc<InMemoryBroker>) -> ApiState {
    state_with(broker, "", "")
}

pub fn json_body(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}
