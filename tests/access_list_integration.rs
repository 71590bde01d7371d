mod common;

use common::{broker, json_body, state_with, CLUSTER_ID};
use rustmq_rest::api::routes;
use rustmq_rest::broker::ClusterMetadata;
use serde_json::json;
use warp::test;

const ALLOWLIST: &str = "api.v3.topics.*,      api.v3.clusters.list";
const BLOCKLIST: &str = "api.v3.topics.delete, api.v3.clusters.list";

async fn status(method: &str, path: &str, allowlist: &str, blocklist: &str) -> u16 {
    let api = routes(state_with(broker(), allowlist, blocklist));
    test::request()
        .method(method)
        .path(path)
        .reply(&api)
        .await
        .status()
        .as_u16()
}

#[tokio::test]
async fn test_allowlisted_topics_are_reachable() {
    let api = routes(state_with(broker(), ALLOWLIST, BLOCKLIST));

    let resp = test::request()
        .method("GET")
        .path(&format!("/v3/clusters/{}/topics", CLUSTER_ID))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 200);
    let body = json_body(resp.body());
    assert_eq!(body["data"][0]["topic_name"], "topic-1");
    assert_eq!(body["data"][0]["partitions_count"], 3);

    let resp = test::request()
        .method("GET")
        .path(&format!("/v3/clusters/{}/topics/topic-1", CLUSTER_ID))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_allowlisted_class_except_blocked_delete() {
    let broker = broker();
    let api = routes(state_with(broker.clone(), ALLOWLIST, BLOCKLIST));
    let topics = format!("/v3/clusters/{}/topics", CLUSTER_ID);

    let resp = test::request()
        .method("POST")
        .path(&topics)
        .json(&json!({ "topic_name": "topic-2", "partitions_count": 2, "replication_factor": 1 }))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 201);
    assert_eq!(json_body(resp.body())["partitions_count"], 2);

    let topic = format!("{}/topic-2", topics);
    let resp = test::request().method("GET").path(&topic).reply(&api).await;
    assert_eq!(resp.status(), 200);

    // delete is blocked but GET on the same path is allowed
    let resp = test::request().method("DELETE").path(&topic).reply(&api).await;
    assert_eq!(resp.status(), 405);
    assert_eq!(
        json_body(resp.body())["message"],
        "api.v3.topics.delete is not accessible: blocked"
    );
    assert!(broker.topics().iter().any(|t| t.name == "topic-2"));
}

#[tokio::test]
async fn test_blocklist_overrides_allowlist() {
    // clusters.list is in both lists; block wins and the path has no other method
    assert_eq!(status("GET", "/v3/clusters", ALLOWLIST, BLOCKLIST).await, 404);
}

#[tokio::test]
async fn test_not_allowlisted_resources_are_hidden() {
    let get_cluster = format!("/v3/clusters/{}", CLUSTER_ID);
    assert_eq!(status("GET", &get_cluster, ALLOWLIST, BLOCKLIST).await, 404);

    let acls = format!("/v3/clusters/{}/acls", CLUSTER_ID);
    assert_eq!(status("GET", &acls, ALLOWLIST, BLOCKLIST).await, 404);
    assert_eq!(status("POST", &acls, ALLOWLIST, BLOCKLIST).await, 404);

    let records = format!("/v3/clusters/{}/topics/topic-1/records", CLUSTER_ID);
    assert_eq!(status("POST", &records, ALLOWLIST, BLOCKLIST).await, 404);
}

#[tokio::test]
async fn test_blocked_method_on_allowed_path_is_method_not_allowed() {
    let acls = format!("/v3/clusters/{}/acls", CLUSTER_ID);
    assert_eq!(status("POST", &acls, "api.v3.acls.*", "api.v3.acls.create").await, 405);
    assert_eq!(status("GET", &acls, "api.v3.acls.*", "api.v3.acls.create").await, 200);
}

#[tokio::test]
async fn test_options_always_allowed() {
    let configs = [
        (ALLOWLIST, BLOCKLIST),
        ("", "*"),
        ("api.v3.nothing", ""),
        ("", ""),
    ];
    let paths = [
        "/v3/clusters".to_string(),
        format!("/v3/clusters/{}", CLUSTER_ID),
        format!("/v3/clusters/{}/acls", CLUSTER_ID),
        format!("/v3/clusters/{}/topics", CLUSTER_ID),
        format!("/v3/clusters/{}/topics/topic-1", CLUSTER_ID),
        format!("/v3/clusters/{}/topics/topic-1/records", CLUSTER_ID),
        format!("/v3/clusters/{}/brokers/1/partition-replicas", CLUSTER_ID),
    ];

    for (allowlist, blocklist) in configs {
        for path in &paths {
            assert_eq!(
                status("OPTIONS", path, allowlist, blocklist).await,
                200,
                "OPTIONS {} with allowlist={:?} blocklist={:?}",
                path,
                allowlist,
                blocklist
            );
        }
    }
}

#[tokio::test]
async fn test_denial_message_keeps_reason() {
    let api = routes(state_with(broker(), ALLOWLIST, BLOCKLIST));

    let resp = test::request()
        .method("GET")
        .path("/v3/clusters")
        .reply(&api)
        .await;
    let body = json_body(resp.body());
    assert_eq!(body["error_code"], 404);
    assert_eq!(
        body["message"],
        "api.v3.clusters.list is not accessible: blocked"
    );

    let resp = test::request()
        .method("GET")
        .path(&format!("/v3/clusters/{}", CLUSTER_ID))
        .reply(&api)
        .await;
    let body = json_body(resp.body());
    assert_eq!(
        body["message"],
        "api.v3.clusters.get is not accessible: not allowlisted"
    );
}

#[tokio::test]
async fn test_no_lists_means_no_restriction() {
    assert_eq!(status("GET", "/v3/clusters", "", "").await, 200);
    assert_eq!(
        status("GET", &format!("/v3/clusters/{}/brokers", CLUSTER_ID), "", "").await,
        200
    );
    assert_eq!(
        status("DELETE", &format!("/v3/clusters/{}/topics/topic-1", CLUSTER_ID), "", "").await,
        204
    );
}

#[tokio::test]
async fn test_topic_admin_errors() {
    let api = routes(state_with(broker(), "", ""));
    let topics = format!("/v3/clusters/{}/topics", CLUSTER_ID);

    let resp = test::request()
        .method("POST")
        .path(&topics)
        .json(&json!({ "topic_name": "topic-1" }))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 409);

    let resp = test::request()
        .method("POST")
        .path(&topics)
        .json(&json!({ "partitions_count": 1 }))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 400);

    let resp = test::request()
        .method("DELETE")
        .path(&format!("{}/missing", topics))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 404);

    let resp = test::request()
        .method("DELETE")
        .path("/v3/clusters/other/topics/topic-1")
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 404);
}
