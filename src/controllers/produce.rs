//! Produce Orchestration
//!
//! Turns a decoded REST produce request into a [`ProducerRecord`], hands it to the broker
//! client and bridges the broker callback into a [`CompletionHandle`]. Broker failures are
//! surfaced as-is; retrying is left to the broker client.

use crate::broker::RecordProducer;
use crate::completion::{completion, join_settled, Completer, CompletionHandle, Outcome};
use crate::types::{PartitionId, ProduceResult, ProducerRecord, RecordHeader};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One record to write, already decoded from its REST representation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProduceRequest {
    pub partition: Option<PartitionId>,
    /// Header name and optional value pairs in the order the client sent them.
    pub headers: Vec<(String, Option<Bytes>)>,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    /// `None` means "now".
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ProduceController {
    producer: Arc<dyn RecordProducer>,
    request_timeout: Option<Duration>,
}

impl ProduceController {
    pub fn new(producer: Arc<dyn RecordProducer>) -> Self {
        Self {
            producer,
            request_timeout: None,
        }
    }

    /// Cancel produces the broker has not acknowledged within `timeout`.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn produce(
        &self,
        cluster_id: &str,
        topic: &str,
        request: ProduceRequest,
    ) -> CompletionHandle<ProduceResult> {
        let record = ProducerRecord {
            topic: topic.to_string(),
            partition: request.partition,
            timestamp: request.timestamp.unwrap_or_else(Utc::now),
            key: request.key,
            value: request.value,
            headers: request
                .headers
                .into_iter()
                .map(|(name, value)| RecordHeader { name, value })
                .collect(),
        };

        debug!(
            "Producing to {}/{} partition={:?}",
            cluster_id, topic, record.partition
        );

        let (handle, completer) = completion();
        self.arm_timeout(&handle, &completer, format!("{}/{}", cluster_id, topic));

        let topic_name = topic.to_string();
        self.producer.send(
            record,
            Box::new(move |result| {
                let result = result.map(|metadata| {
                    ProduceResult::from_record_metadata(metadata, Utc::now())
                });
                if let Err(error) = &result {
                    warn!("Produce to {} failed: {}", topic_name, error);
                }
                if !completer.complete(result) {
                    warn!("Broker acknowledged a produce to {} after it was cancelled", topic_name);
                }
            }),
        );

        handle
    }

    /// Sends every request and settles once the last broker callback has fired. Outcomes
    /// are reported in request order.
    pub fn produce_batch(
        &self,
        cluster_id: &str,
        topic: &str,
        requests: Vec<ProduceRequest>,
    ) -> CompletionHandle<Vec<Outcome<ProduceResult>>> {
        let handles = requests
            .into_iter()
            .map(|request| self.produce(cluster_id, topic, request))
            .collect();
        join_settled(handles)
    }

    /// Cancels `handle` unless it settles within the request timeout. The timer task ends
    /// as soon as the handle resolves either way.
    fn arm_timeout(
        &self,
        handle: &CompletionHandle<ProduceResult>,
        completer: &Completer<ProduceResult>,
        target: String,
    ) {
        let Some(timeout) = self.request_timeout else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available, produce timeout not armed");
            return;
        };

        let handle = handle.clone();
        let completer = completer.clone();
        runtime.spawn(async move {
            if tokio::time::timeout(timeout, handle).await.is_err() && completer.cancel() {
                warn!("Produce to {} timed out after {:?}", target, timeout);
            }
        });
    }
}
