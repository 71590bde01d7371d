use crate::access::DenyReason;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

pub struct GatewayMetrics {
    pub records_produced: IntCounter,
    pub produce_failures: IntCounter,
    pub produce_latency: Histogram,
    pub acl_batches_created: IntCounter,
    pub access_denials: IntCounterVec,
    pub registry: Registry,
}

impl GatewayMetrics {
    pub fn new() -> crate::Result<Arc<Self>> {
        let registry = Registry::new();

        let records_produced = IntCounter::new(
            "rest_records_produced_total",
            "Total number of records acknowledged by the broker",
        )?;

        let produce_failures = IntCounter::new(
            "rest_produce_failures_total",
            "Total number of produce requests that failed or timed out",
        )?;

        let produce_latency = Histogram::with_opts(HistogramOpts::new(
            "rest_produce_latency_seconds",
            "Time from submitting a record to the broker acknowledging it",
        ))?;

        let acl_batches_created = IntCounter::new(
            "rest_acl_batches_created_total",
            "Total number of ACL batches created",
        )?;

        let access_denials = IntCounterVec::new(
            Opts::new(
                "rest_access_denials_total",
                "Requests refused by the endpoint access list",
            ),
            &["reason"],
        )?;

        registry.register(Box::new(records_produced.clone()))?;
        registry.register(Box::new(produce_failures.clone()))?;
        registry.register(Box::new(produce_latency.clone()))?;
        registry.register(Box::new(acl_batches_created.clone()))?;
        registry.register(Box::new(access_denials.clone()))?;

        Ok(Arc::new(Self {
            records_produced,
            produce_failures,
            produce_latency,
            acl_batches_created,
            access_denials,
            registry,
        }))
    }

    pub fn record_denial(&self, reason: DenyReason) {
        self.access_denials
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> crate::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::error::GatewayError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_denials_by_reason() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.record_denial(DenyReason::Blocked);
        metrics.record_denial(DenyReason::NotAllowlisted);
        metrics.record_denial(DenyReason::Blocked);
        metrics.records_produced.inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("rest_access_denials_total{reason=\"blocked\"} 2"));
        assert!(text.contains("rest_access_denials_total{reason=\"not allowlisted\"} 1"));
        assert!(text.contains("rest_records_produced_total 1"));
    }
}
