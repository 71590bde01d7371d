//! Static route metadata
//!
//! Every REST endpoint is registered here with the canonical resource name the access
//! gate evaluates. Path templates use `{name}` for variable segments.

use crate::types::RequestIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    pub method: &'static str,
    pub path: &'static str,
    pub resource_name: &'static str,
}

const fn route(method: &'static str, path: &'static str, resource_name: &'static str) -> RouteSpec {
    RouteSpec {
        method,
        path,
        resource_name,
    }
}

pub const CLUSTERS_LIST: &str = "api.v3.clusters.list";
pub const CLUSTERS_GET: &str = "api.v3.clusters.get";
pub const TOPICS_LIST: &str = "api.v3.topics.list";
pub const TOPICS_GET: &str = "api.v3.topics.get";
pub const TOPICS_CREATE: &str = "api.v3.topics.create";
pub const TOPICS_DELETE: &str = "api.v3.topics.delete";
pub const PRODUCE: &str = "api.v3.produce.produce-to-topic";
pub const PRODUCE_BATCH: &str = "api.v3.produce.produce-batch";
pub const ACLS_SEARCH: &str = "api.v3.acls.search";
pub const ACLS_CREATE: &str = "api.v3.acls.create";
pub const ACLS_BATCH_CREATE: &str = "api.v3.acls.batch-create";
pub const BROKERS_LIST: &str = "api.v3.brokers.list";
pub const REPLICAS_SEARCH_BY_BROKER: &str = "api.v3.replicas.search-by-broker";

pub const ROUTES: &[RouteSpec] = &[
    route("GET", "/v3/clusters", CLUSTERS_LIST),
    route("GET", "/v3/clusters/{cluster_id}", CLUSTERS_GET),
    route("GET", "/v3/clusters/{cluster_id}/topics", TOPICS_LIST),
    route("POST", "/v3/clusters/{cluster_id}/topics", TOPICS_CREATE),
    route("GET", "/v3/clusters/{cluster_id}/topics/{topic_name}", TOPICS_GET),
    route("DELETE", "/v3/clusters/{cluster_id}/topics/{topic_name}", TOPICS_DELETE),
    route("POST", "/v3/clusters/{cluster_id}/topics/{topic_name}/records", PRODUCE),
    route("POST", "/v3/clusters/{cluster_id}/topics/{topic_name}/records:batch", PRODUCE_BATCH),
    route("GET", "/v3/clusters/{cluster_id}/acls", ACLS_SEARCH),
    route("POST", "/v3/clusters/{cluster_id}/acls", ACLS_CREATE),
    route("POST", "/v3/clusters/{cluster_id}/acls:batch", ACLS_BATCH_CREATE),
    route("GET", "/v3/clusters/{cluster_id}/brokers", BROKERS_LIST),
    route(
        "GET",
        "/v3/clusters/{cluster_id}/brokers/{broker_id}/partition-replicas",
        REPLICAS_SEARCH_BY_BROKER,
    ),
];

pub fn route_for(resource_name: &str) -> Option<&'static RouteSpec> {
    ROUTES.iter().find(|r| r.resource_name == resource_name)
}

/// Identities of every method registered on the same path as `resource_name`.
pub fn siblings(resource_name: &str) -> Vec<RequestIdentity> {
    match route_for(resource_name) {
        Some(spec) => ROUTES
            .iter()
            .filter(|r| r.path == spec.path)
            .map(|r| RequestIdentity::new(r.resource_name, r.method))
            .collect(),
        None => Vec::new(),
    }
}

/// Routes whose template matches a concrete request path.
pub fn routes_for_path(path: &str) -> Vec<&'static RouteSpec> {
    ROUTES
        .iter()
        .filter(|r| template_matches(r.path, path))
        .collect()
}

/// Value of the `Allow` header for a concrete request path, or `None` for unknown paths.
pub fn allowed_methods(path: &str) -> Option<String> {
    let routes = routes_for_path(path);
    if routes.is_empty() {
        return None;
    }
    let mut methods: Vec<&str> = routes.iter().map(|r| r.method).collect();
    methods.dedup();
    methods.push("OPTIONS");
    Some(methods.join(", "))
}

fn template_matches(template: &str, path: &str) -> bool {
    let template: Vec<&str> = template.trim_matches('/').split('/').collect();
    let path: Vec<&str> = path.trim_matches('/').split('/').collect();
    template.len() == path.len()
        && template.iter().zip(&path).all(|(t, p)| {
            if t.starts_with('{') && t.ends_with('}') {
                !p.is_empty()
            } else {
                t == p
            }
        })
}
