use super::handlers::{self, error_reply};
use super::routes::{self, *};
use crate::access::{AccessControlGate, AccessDecision, DenialKind, DenyReason};
use crate::broker::{AclAdmin, ClusterMetadata, RecordProducer, TopicAdmin};
use crate::controllers::{AclManager, ClusterQueryService, ProduceController, TopicManager};
use crate::error::GatewayError;
use crate::metrics::GatewayMetrics;
use crate::types::{AclFilter, RequestIdentity};
use crate::Result;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use warp::filters::BoxedFilter;
use warp::http::{Method, StatusCode};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};
use tracing::{debug, error, info, warn};

/// Request bodies larger than this are refused unless configured otherwise.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

/// Everything a request handler needs, shared across all requests.
#[derive(Clone)]
pub struct ApiState {
    pub gate: AccessControlGate,
    pub producer: ProduceController,
    pub acls: AclManager,
    pub topics: TopicManager,
    pub cluster: ClusterQueryService,
    pub metrics: Arc<GatewayMetrics>,
    pub max_body_bytes: u64,
}

impl ApiState {
    /// Wires every controller to one broker client.
    pub fn with_broker<B>(
        gate: AccessControlGate,
        broker: Arc<B>,
        request_timeout: Option<Duration>,
    ) -> Result<Self>
    where
        B: RecordProducer + AclAdmin + TopicAdmin + ClusterMetadata + 'static,
    {
        Ok(Self {
            gate,
            producer: ProduceController::new(broker.clone()).with_request_timeout(request_timeout),
            acls: AclManager::new(broker.clone()),
            topics: TopicManager::new(broker.clone()),
            cluster: ClusterQueryService::new(broker),
            metrics: GatewayMetrics::new()?,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Refusal issued by the access gate before any handler runs.
#[derive(Debug)]
pub struct AccessRejection {
    pub identity: RequestIdentity,
    pub reason: DenyReason,
    pub kind: DenialKind,
}

impl warp::reject::Reject for AccessRejection {}

fn with_state(state: ApiState) -> impl Filter<Extract = (ApiState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Buffers the request body, refusing bodies over `limit` bytes before reading them.
fn body(limit: u64) -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::body::content_length_limit(limit).and(warp::body::bytes())
}

/// Admits the request for `resource_name` or rejects it with an [`AccessRejection`].
fn guard(
    state: &ApiState,
    resource_name: &'static str,
) -> impl Filter<Extract = (ApiState,), Error = Rejection> + Clone {
    warp::method()
        .and(with_state(state.clone()))
        .and_then(move |method: Method, state: ApiState| async move {
            let identity = RequestIdentity::new(resource_name, method.as_str());
            match state.gate.evaluate(&identity) {
                AccessDecision::Allow => Ok(state),
                AccessDecision::Deny(reason) => {
                    let kind = state.gate.classify_denial(&routes::siblings(resource_name));
                    state.metrics.record_denial(reason);
                    warn!("Rejected {}: {}", identity, reason);
                    Err(warp::reject::custom(AccessRejection {
                        identity,
                        reason,
                        kind,
                    }))
                }
            }
        })
}

async fn handle_options(
    path: warp::path::FullPath,
    state: ApiState,
) -> std::result::Result<Response, Rejection> {
    let (route, allow) = match (
        routes::routes_for_path(path.as_str()).first(),
        routes::allowed_methods(path.as_str()),
    ) {
        (Some(route), Some(allow)) => (*route, allow),
        _ => return Err(warp::reject::not_found()),
    };

    let identity = RequestIdentity::new(route.resource_name, "OPTIONS");
    if let AccessDecision::Deny(reason) = state.gate.evaluate(&identity) {
        // pre-flight is never gated; reaching this is a bug in the gate
        error!("OPTIONS denied for {}: {}", identity, reason);
    }

    Ok(warp::reply::with_header(StatusCode::OK, "allow", allow).into_response())
}

pub async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    if let Some(rejection) = err.find::<AccessRejection>() {
        let status = match rejection.kind {
            DenialKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            DenialKind::NotFound => StatusCode::NOT_FOUND,
        };
        let message = format!(
            "{} is not accessible: {}",
            rejection.identity.resource_name, rejection.reason
        );
        return Ok(error_reply(status, message));
    }

    // sibling routes' rejections arrive combined; specific ones win over method mismatches
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "A content-length header is required")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    };

    Ok(error_reply(status, message))
}

/// Full route tree: every REST endpoint behind the access gate, plus `/metrics` and
/// pre-flight `OPTIONS` handling.
pub fn routes(state: ApiState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let limit = state.max_body_bytes;

    let list_clusters = warp::path!("v3" / "clusters")
        .and(warp::get())
        .and(guard(&state, CLUSTERS_LIST))
        .and_then(handlers::list_clusters)
        .boxed();

    let get_cluster = warp::path!("v3" / "clusters" / String)
        .and(warp::get())
        .and(guard(&state, CLUSTERS_GET))
        .and_then(handlers::get_cluster)
        .boxed();

    let list_topics = warp::path!("v3" / "clusters" / String / "topics")
        .and(warp::get())
        .and(guard(&state, TOPICS_LIST))
        .and_then(handlers::list_topics)
        .boxed();

    let create_topic = warp::path!("v3" / "clusters" / String / "topics")
        .and(warp::post())
        .and(guard(&state, TOPICS_CREATE))
        .and(body(limit))
        .and_then(handlers::create_topic)
        .boxed();

    let get_topic = warp::path!("v3" / "clusters" / String / "topics" / String)
        .and(warp::get())
        .and(guard(&state, TOPICS_GET))
        .and_then(handlers::get_topic)
        .boxed();

    let delete_topic = warp::path!("v3" / "clusters" / String / "topics" / String)
        .and(warp::delete())
        .and(guard(&state, TOPICS_DELETE))
        .and_then(handlers::delete_topic)
        .boxed();

    let produce = warp::path!("v3" / "clusters" / String / "topics" / String / "records")
        .and(warp::post())
        .and(guard(&state, PRODUCE))
        .and(body(limit))
        .and_then(handlers::produce)
        .boxed();

    let produce_batch =
        warp::path!("v3" / "clusters" / String / "topics" / String / "records:batch")
            .and(warp::post())
            .and(guard(&state, PRODUCE_BATCH))
            .and(body(limit))
            .and_then(handlers::produce_batch)
            .boxed();

    let search_acls = warp::path!("v3" / "clusters" / String / "acls")
        .and(warp::get())
        .and(guard(&state, ACLS_SEARCH))
        .and(warp::query::<AclFilter>())
        .and_then(handlers::search_acls)
        .boxed();

    let create_acl = warp::path!("v3" / "clusters" / String / "acls")
        .and(warp::post())
        .and(guard(&state, ACLS_CREATE))
        .and(body(limit))
        .and_then(handlers::create_acl)
        .boxed();

    let batch_create_acls = warp::path!("v3" / "clusters" / String / "acls:batch")
        .and(warp::post())
        .and(guard(&state, ACLS_BATCH_CREATE))
        .and(body(limit))
        .and_then(handlers::batch_create_acls)
        .boxed();

    let list_brokers = warp::path!("v3" / "clusters" / String / "brokers")
        .and(warp::get())
        .and(guard(&state, BROKERS_LIST))
        .and_then(handlers::list_brokers)
        .boxed();

    let search_replicas =
        warp::path!("v3" / "clusters" / String / "brokers" / i32 / "partition-replicas")
            .and(warp::get())
            .and(guard(&state, REPLICAS_SEARCH_BY_BROKER))
            .and_then(handlers::search_replicas_by_broker)
            .boxed();

    let options: BoxedFilter<(Response,)> = warp::options()
        .and(warp::path::full())
        .and(with_state(state.clone()))
        .and_then(handle_options)
        .boxed();

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::metrics)
        .boxed();

    list_clusters
        .or(get_cluster)
        .unify()
        .or(list_topics)
        .unify()
        .or(create_topic)
        .unify()
        .or(get_topic)
        .unify()
        .or(delete_topic)
        .unify()
        .or(produce)
        .unify()
        .or(produce_batch)
        .unify()
        .or(search_acls)
        .unify()
        .or(create_acl)
        .unify()
        .or(batch_create_acls)
        .unify()
        .or(list_brokers)
        .unify()
        .or(search_replicas)
        .unify()
        .or(options)
        .unify()
        .or(metrics)
        .unify()
        .with(warp::log("rustmq_rest::access"))
        .recover(handle_rejection)
}

/// REST front end for a broker cluster.
pub struct RestApi {
    state: ApiState,
    listen: SocketAddr,
}

impl RestApi {
    pub fn new(state: ApiState, listen: SocketAddr) -> Self {
        Self { state, listen }
    }

    /// Serves until `shutdown` resolves.
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (addr, server) = warp::serve(routes(self.state))
            .try_bind_with_graceful_shutdown(self.listen, shutdown)
            .map_err(|e| GatewayError::Internal(format!("Failed to bind {}: {}", self.listen, e)))?;

        info!("Starting REST proxy on {}", addr);
        server.await;
        debug!("REST proxy on {} stopped", addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessRuleSet;
    use crate::broker::{InMemoryBroker, TopicSpec};
    use crate::types::BrokerInfo;
    use warp::test;

    fn state(allowlist: &str, blocklist: &str) -> ApiState {
        let broker = InMemoryBroker::new("cluster-1");
        broker.add_broker(BrokerInfo {
            id: 1,
            host: "localhost".to_string(),
            port: 9092,
            rack: None,
        });
        broker.add_topic(TopicSpec::spread("topic-1", 2, 1, &[1]));
        let gate = AccessControlGate::new(AccessRuleSet::from_lists(allowlist, blocklist).unwrap());
        ApiState::with_broker(gate, Arc::new(broker), None).unwrap()
    }

    #[tokio::test]
    async fn test_denied_route_never_reaches_handler() {
        let state = state("", "api.v3.produce.*");
        let produced = state.metrics.records_produced.get();

        let resp = test::request()
            .method("POST")
            .path("/v3/clusters/cluster-1/topics/topic-1/records")
            .body(r#"{"value":{"data":1}}"#)
            .reply(&routes(state.clone()))
            .await;

        // the records path has no other method, so the whole path is hidden
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["error_code"], 404);
        assert!(body["message"].as_str().unwrap().contains("blocked"));
        assert_eq!(state.metrics.records_produced.get(), produced);
    }

    #[tokio::test]
    async fn test_blocked_method_on_reachable_path() {
        let state = state("", "api.v3.acls.create");

        let resp = test::request()
            .method("POST")
            .path("/v3/clusters/cluster-1/acls")
            .body("{}")
            .reply(&routes(state.clone()))
            .await;
        assert_eq!(resp.status(), 405);

        let resp = test::request()
            .method("GET")
            .path("/v3/clusters/cluster-1/acls")
            .reply(&routes(state))
            .await;
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_options_lists_methods() {
        let state = state("api.v3.none", "*");
        let resp = test::request()
            .method("OPTIONS")
            .path("/v3/clusters/cluster-1/acls")
            .reply(&routes(state.clone()))
            .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["allow"], "GET, POST, OPTIONS");

        let resp = test::request()
            .method("OPTIONS")
            .path("/v3/nowhere")
            .reply(&routes(state))
            .await;
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_unknown_cluster_is_not_found() {
        let resp = test::request()
            .method("POST")
            .path("/v3/clusters/other/topics/topic-1/records")
            .body(r#"{"value":{"data":"x"}}"#)
            .reply(&routes(state("", "")))
            .await;
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_is_not_gated() {
        let state = state("api.v3.topics.*", "");
        let resp = test::request()
            .method("GET")
            .path("/v3/clusters")
            .reply(&routes(state.clone()))
            .await;
        assert_eq!(resp.status(), 404);

        let resp = test::request()
            .method("GET")
            .path("/metrics")
            .reply(&routes(state))
            .await;
        assert_eq!(resp.status(), 200);
        let text = String::from_utf8(resp.body().to_vec()).unwrap();
        assert!(text.contains("rest_access_denials_total{reason=\"not allowlisted\"} 1"));
    }

    #[tokio::test]
    async fn test_request_body_limit() {
        let state = state("", "").with_max_body_bytes(32);
        let api = routes(state.clone());
        let path = "/v3/clusters/cluster-1/topics/topic-1/records";

        let resp = test::request()
            .method("POST")
            .path(path)
            .body(format!(r#"{{"value":{{"data":"{}"}}}}"#, "x".repeat(64)))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), 413);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["error_code"], 413);

        let resp = test::request().method("POST").path(path).reply(&api).await;
        assert_eq!(resp.status(), 411);
        assert_eq!(state.metrics.records_produced.get(), 0);

        let resp = test::request()
            .method("POST")
            .path(path)
            .body(r#"{"value":{"data":1}}"#)
            .reply(&api)
            .await;
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_replicas_by_broker() {
        let resp = test::request()
            .method("GET")
            .path("/v3/clusters/cluster-1/brokers/1/partition-replicas")
            .reply(&routes(state("", "")))
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(
            body["data"][1]["resource_name"],
            "crn:///kafka=cluster-1/topic=topic-1/partition=1/replica=1"
        );

        let resp = test::request()
            .method("GET")
            .path("/v3/clusters/cluster-1/brokers/7/partition-replicas")
            .reply(&routes(state("", "")))
            .await;
        assert_eq!(resp.status(), 404);
    }
}
