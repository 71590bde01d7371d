use super::models::{
    AclList, BrokerData, ClusterData, CreateAclBatchRequest, CreateTopicRequest, ErrorResponse,
    ListResponse, ProduceBatchFailure, ProduceBatchRequest, ProduceBatchResponse,
    ProduceBatchSuccess, ProduceRequestBody, ProduceResponse, ReplicaData, TopicData,
};
use super::server::ApiState;
use crate::completion::Outcome;
use crate::error::{BrokerError, GatewayError, Result};
use crate::types::{AclFilter, AclSpec};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};

pub fn error_status(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        GatewayError::ClusterNotFound(_)
        | GatewayError::TopicNotFound(_)
        | GatewayError::BrokerNotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
        GatewayError::Broker(error) => broker_error_status(error),
        GatewayError::Io(_)
        | GatewayError::Config(_)
        | GatewayError::InvalidConfig(_)
        | GatewayError::Metrics(_)
        | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn broker_error_status(error: &BrokerError) -> StatusCode {
    match error {
        BrokerError::UnknownTopicOrPartition { .. } => StatusCode::NOT_FOUND,
        BrokerError::NotLeaderOrFollower { .. } | BrokerError::BrokerNotAvailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        BrokerError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
        BrokerError::RecordTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        BrokerError::InvalidRecord(_)
        | BrokerError::InvalidTopic(_)
        | BrokerError::SecurityDisabled(_) => StatusCode::BAD_REQUEST,
        BrokerError::TopicAlreadyExists(_) => StatusCode::CONFLICT,
        BrokerError::AuthorizationFailed(_) => StatusCode::FORBIDDEN,
        BrokerError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_reply(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error_code: status.as_u16(),
        message: message.into(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn gateway_error_reply(error: &GatewayError) -> Response {
    error_reply(error_status(error), error.to_string())
}

fn json_reply<T: serde::Serialize>(status: StatusCode, body: &T) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

/// Empty bodies are an invalid payload (422); bodies that do not parse are a bad request.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(GatewayError::InvalidPayload(
            "Request body is empty. Data is required.".to_string(),
        ));
    }
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::Validation(format!("Malformed request body: {}", e)))
}

fn respond<T: serde::Serialize>(result: Result<T>) -> std::result::Result<Response, Rejection> {
    Ok(match result {
        Ok(body) => json_reply(StatusCode::OK, &body),
        Err(error) => gateway_error_reply(&error),
    })
}

pub async fn list_clusters(state: ApiState) -> std::result::Result<Response, Rejection> {
    let clusters: Vec<ClusterData> = state
        .cluster
        .list_clusters()
        .into_iter()
        .map(ClusterData::from)
        .collect();
    respond(Ok(ListResponse::new(clusters)))
}

pub async fn get_cluster(
    cluster_id: String,
    state: ApiState,
) -> std::result::Result<Response, Rejection> {
    respond(state.cluster.get_cluster(&cluster_id).map(ClusterData::from))
}

pub async fn list_topics(
    cluster_id: String,
    state: ApiState,
) -> std::result::Result<Response, Rejection> {
    respond(state.cluster.list_topics(&cluster_id).map(|topics| {
        ListResponse::new(
            topics
                .into_iter()
                .map(|t| TopicData::new(&cluster_id, t))
                .collect(),
        )
    }))
}

pub async fn get_topic(
    cluster_id: String,
    topic_name: String,
    state: ApiState,
) -> std::result::Result<Response, Rejection> {
    respond(
        state
            .cluster
            .get_topic(&cluster_id, &topic_name)
            .map(|t| TopicData::new(&cluster_id, t)),
    )
}

pub async fn create_topic(
    cluster_id: String,
    state: ApiState,
    body: Bytes,
) -> std::result::Result<Response, Rejection> {
    let result: Result<TopicData> = async {
        state.cluster.check_cluster(&cluster_id)?;
        let request: CreateTopicRequest = parse_body(&body)?;
        let created = state
            .topics
            .create_topic(
                request.topic_name,
                request.partitions_count,
                request.replication_factor,
            )?
            .await?;
        Ok(TopicData::new(&cluster_id, created))
    }
    .await;

    Ok(match result {
        Ok(topic) => json_reply(StatusCode::CREATED, &topic),
        Err(error) => gateway_error_reply(&error),
    })
}

pub async fn delete_topic(
    cluster_id: String,
    topic_name: String,
    state: ApiState,
) -> std::result::Result<Response, Rejection> {
    let result: Result<()> = async {
        state.cluster.check_cluster(&cluster_id)?;
        state.topics.delete_topic(&topic_name).await
    }
    .await;

    Ok(match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => gateway_error_reply(&error),
    })
}

pub async fn list_brokers(
    cluster_id: String,
    state: ApiState,
) -> std::result::Result<Response, Rejection> {
    respond(state.cluster.list_brokers(&cluster_id).map(|brokers| {
        ListResponse::new(
            brokers
                .into_iter()
                .map(|b| BrokerData::new(&cluster_id, b))
                .collect(),
        )
    }))
}

pub async fn search_replicas_by_broker(
    cluster_id: String,
    broker_id: i32,
    state: ApiState,
) -> std::result::Result<Response, Rejection> {
    respond(
        state
            .cluster
            .search_replicas_by_broker(&cluster_id, broker_id)
            .map(|replicas| {
                ListResponse::new(
                    replicas
                        .into_iter()
                        .map(|r| ReplicaData::new(&cluster_id, r))
                        .collect(),
                )
            }),
    )
}

pub async fn produce(
    cluster_id: String,
    topic_name: String,
    state: ApiState,
    body: Bytes,
) -> std::result::Result<Response, Rejection> {
    Ok(match produce_record(&cluster_id, &topic_name, &state, &body).await {
        Ok(response) => json_reply(StatusCode::OK, &response),
        Err(error) => {
            state.metrics.produce_failures.inc();
            gateway_error_reply(&error)
        }
    })
}

async fn produce_record(
    cluster_id: &str,
    topic_name: &str,
    state: &ApiState,
    body: &Bytes,
) -> Result<ProduceResponse> {
    state.cluster.check_cluster(cluster_id)?;
    let request = parse_body::<ProduceRequestBody>(body)?.into_request()?;

    let started = Instant::now();
    let result = state
        .producer
        .produce(cluster_id, topic_name, request)
        .await?;
    state
        .metrics
        .produce_latency
        .observe(started.elapsed().as_secs_f64());
    state.metrics.records_produced.inc();

    debug!(
        "Produced to {}-{} at offset {}",
        topic_name, result.partition, result.offset
    );
    Ok(ProduceResponse::new(cluster_id, topic_name, result))
}

pub async fn produce_batch(
    cluster_id: String,
    topic_name: String,
    state: ApiState,
    body: Bytes,
) -> std::result::Result<Response, Rejection> {
    Ok(
        match produce_record_batch(&cluster_id, &topic_name, &state, &body).await {
            Ok(response) => json_reply(StatusCode::MULTI_STATUS, &response),
            Err(error) => gateway_error_reply(&error),
        },
    )
}

async fn produce_record_batch(
    cluster_id: &str,
    topic_name: &str,
    state: &ApiState,
    body: &Bytes,
) -> Result<ProduceBatchResponse> {
    state.cluster.check_cluster(cluster_id)?;
    let batch: ProduceBatchRequest = parse_body(body)?;
    if batch.entries.is_empty() {
        return Err(GatewayError::InvalidPayload(
            "Batch entries are required.".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(batch.entries.len());
    let mut requests = Vec::with_capacity(batch.entries.len());
    for entry in batch.entries {
        let (id, body) = entry.into_parts();
        if id.is_empty() {
            return Err(GatewayError::Validation("Batch entry id is required".to_string()));
        }
        if !seen.insert(id.clone()) {
            return Err(GatewayError::Validation(format!(
                "Batch entry id {} is not unique",
                id
            )));
        }
        requests.push(body.into_request()?);
        ids.push(id);
    }

    let outcomes = state
        .producer
        .produce_batch(cluster_id, topic_name, requests)
        .await?;

    let mut response = ProduceBatchResponse::default();
    for (id, outcome) in ids.into_iter().zip(outcomes) {
        match outcome {
            Outcome::Succeeded(result) => {
                state.metrics.records_produced.inc();
                response.successes.push(ProduceBatchSuccess {
                    id,
                    result: ProduceResponse::new(cluster_id, topic_name, result),
                });
            }
            Outcome::Failed(error) => {
                state.metrics.produce_failures.inc();
                let error = GatewayError::Broker(error);
                response.failures.push(ProduceBatchFailure {
                    id,
                    error_code: error_status(&error).as_u16(),
                    message: error.to_string(),
                });
            }
            Outcome::Cancelled => {
                state.metrics.produce_failures.inc();
                let error = GatewayError::RequestTimeout;
                response.failures.push(ProduceBatchFailure {
                    id,
                    error_code: error_status(&error).as_u16(),
                    message: error.to_string(),
                });
            }
        }
    }
    Ok(response)
}

pub async fn search_acls(
    cluster_id: String,
    state: ApiState,
    filter: AclFilter,
) -> std::result::Result<Response, Rejection> {
    let result: Result<AclList> = async {
        state.cluster.check_cluster(&cluster_id)?;
        let acls = state.acls.search_acls(filter).await?;
        Ok(AclList::new(
            acls.into_iter()
                .filter(|acl| acl.cluster_id == cluster_id)
                .collect(),
        ))
    }
    .await;
    respond(result)
}

pub async fn create_acl(
    cluster_id: String,
    state: ApiState,
    body: Bytes,
) -> std::result::Result<Response, Rejection> {
    let result: Result<AclSpec> = async {
        state.cluster.check_cluster(&cluster_id)?;
        let spec: AclSpec = parse_body(&body)?;
        state.acls.create_acl(&cluster_id, spec.clone())?.await?;
        Ok(spec)
    }
    .await;

    Ok(match result {
        Ok(spec) => json_reply(StatusCode::CREATED, &spec),
        Err(error) => gateway_error_reply(&error),
    })
}

pub async fn batch_create_acls(
    cluster_id: String,
    state: ApiState,
    body: Bytes,
) -> std::result::Result<Response, Rejection> {
    let result: Result<()> = async {
        state.cluster.check_cluster(&cluster_id)?;
        let request: CreateAclBatchRequest = parse_body(&body)?;
        state.acls.create_acls(&cluster_id, request.data)?.await
    }
    .await;

    Ok(match result {
        Ok(()) => {
            state.metrics.acl_batches_created.inc();
            info!("ACL batch created on cluster {}", cluster_id);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(error) => gateway_error_reply(&error),
    })
}

pub async fn metrics(state: ApiState) -> std::result::Result<Response, Rejection> {
    Ok(match state.metrics.render() {
        Ok(text) => warp::reply::with_header(text, "content-type", "text/plain; version=0.0.4")
            .into_response(),
        Err(error) => gateway_error_reply(&error),
    })
}
