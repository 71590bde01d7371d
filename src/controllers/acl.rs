//! Broker ACL management
//!
//! Batch creation is all-or-nothing from the gateway's point of view: every entry is
//! validated before the admin client is touched, and the accepted entries are submitted as
//! one batch.

use crate::broker::AclAdmin;
use crate::completion::{completion, CompletionHandle};
use crate::error::{GatewayError, Result};
use crate::types::{
    Acl, AclFilter, AclOperation, AclPatternType, AclPermission, AclResourceType, AclSpec,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AclManager {
    admin: Arc<dyn AclAdmin>,
}

impl AclManager {
    pub fn new(admin: Arc<dyn AclAdmin>) -> Self {
        Self { admin }
    }

    /// Validates and submits `specs` as one batch. Validation failures are returned
    /// directly; broker failures arrive through the returned handle.
    pub fn create_acls(
        &self,
        cluster_id: &str,
        specs: Option<Vec<AclSpec>>,
    ) -> Result<CompletionHandle<()>> {
        let specs = match specs {
            Some(specs) if !specs.is_empty() => specs,
            _ => {
                return Err(GatewayError::InvalidPayload(
                    "Request body is empty. Data is required.".to_string(),
                ))
            }
        };
        let acls = validate_acl_create_parameters(cluster_id, &specs)?;

        info!("Creating {} ACLs on cluster {}", acls.len(), cluster_id);
        Ok(self.submit(acls))
    }

    pub fn create_acl(&self, cluster_id: &str, spec: AclSpec) -> Result<CompletionHandle<()>> {
        let acl = validate_acl_spec(cluster_id, &spec)?;
        debug!("Creating ACL for {} on cluster {}", acl.principal, cluster_id);
        Ok(self.submit(vec![acl]))
    }

    pub fn search_acls(&self, filter: AclFilter) -> CompletionHandle<Vec<Acl>> {
        let (handle, completer) = completion();
        let admin = self.admin.clone();
        tokio::spawn(async move {
            completer.complete(admin.describe_acls(filter).await);
        });
        handle
    }

    fn submit(&self, acls: Vec<Acl>) -> CompletionHandle<()> {
        let (handle, completer) = completion();
        let admin = self.admin.clone();
        tokio::spawn(async move {
            let result = admin.create_acls(acls).await;
            if let Err(error) = &result {
                warn!("ACL creation failed: {}", error);
            }
            completer.complete(result);
        });
        handle
    }
}

/// Converts every entry, stopping at the first invalid one.
pub fn validate_acl_create_parameters(cluster_id: &str, specs: &[AclSpec]) -> Result<Vec<Acl>> {
    specs
        .iter()
        .map(|spec| validate_acl_spec(cluster_id, spec))
        .collect()
}

pub fn validate_acl_spec(cluster_id: &str, spec: &AclSpec) -> Result<Acl> {
    let resource_type = required(spec.resource_type, "resource_type")?;
    if matches!(resource_type, AclResourceType::Any | AclResourceType::Unknown) {
        return Err(invalid("resource_type", resource_type));
    }

    let resource_name = required_text(spec.resource_name.as_deref(), "resource_name")?;

    let pattern_type = required(spec.pattern_type, "pattern_type")?;
    if !matches!(pattern_type, AclPatternType::Literal | AclPatternType::Prefixed) {
        return Err(invalid("pattern_type", pattern_type));
    }

    let principal = required_text(spec.principal.as_deref(), "principal")?;
    let host = required_text(spec.host.as_deref(), "host")?;

    let operation = required(spec.operation, "operation")?;
    if matches!(operation, AclOperation::Any | AclOperation::Unknown) {
        return Err(invalid("operation", operation));
    }

    let permission = required(spec.permission, "permission")?;
    if matches!(permission, AclPermission::Any | AclPermission::Unknown) {
        return Err(invalid("permission", permission));
    }

    Ok(Acl {
        cluster_id: cluster_id.to_string(),
        resource_type,
        resource_name,
        pattern_type,
        principal,
        host,
        operation,
        permission,
    })
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| GatewayError::Validation(format!("{} is required", field)))
}

fn required_text(value: Option<&str>, field: &str) -> Result<String> {
    match value {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        Some(_) => Err(GatewayError::Validation(format!("{} must not be empty", field))),
        None => Err(GatewayError::Validation(format!("{} is required", field))),
    }
}

fn invalid<T: std::fmt::Debug>(field: &str, value: T) -> GatewayError {
    GatewayError::Validation(format!("{} cannot be {:?}", field, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::error::BrokerError;

    fn spec(principal: &str) -> AclSpec {
        AclSpec {
            resource_type: Some(AclResourceType::Topic),
            resource_name: Some("orders".to_string()),
            pattern_type: Some(AclPatternType::Literal),
            principal: Some(principal.to_string()),
            host: Some("*".to_string()),
            operation: Some(AclOperation::Write),
            permission: Some(AclPermission::Allow),
        }
    }

    #[test]
    fn test_validate_acl_spec() {
        let acl = validate_acl_spec("cluster-1", &spec("User:alice")).unwrap();
        assert_eq!(acl.cluster_id, "cluster-1");
        assert_eq!(acl.principal, "User:alice");
        assert_eq!(acl.operation, AclOperation::Write);
    }

    #[test]
    fn test_validate_missing_and_wildcard_fields() {
        let cases = [
            (AclSpec { resource_type: None, ..spec("u") }, "resource_type is required"),
            (
                AclSpec { resource_type: Some(AclResourceType::Any), ..spec("u") },
                "resource_type cannot be Any",
            ),
            (AclSpec { resource_name: Some(String::new()), ..spec("u") }, "resource_name must not be empty"),
            (
                AclSpec { pattern_type: Some(AclPatternType::Match), ..spec("u") },
                "pattern_type cannot be Match",
            ),
            (AclSpec { host: None, ..spec("u") }, "host is required"),
            (
                AclSpec { operation: Some(AclOperation::Unknown), ..spec("u") },
                "operation cannot be Unknown",
            ),
            (
                AclSpec { permission: Some(AclPermission::Any), ..spec("u") },
                "permission cannot be Any",
            ),
        ];

        for (spec, expected) in cases {
            match validate_acl_spec("c", &spec) {
                Err(GatewayError::Validation(message)) => assert_eq!(message, expected),
                other => panic!("expected validation error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_first_invalid_entry_is_reported() {
        let specs = vec![
            spec("User:a"),
            AclSpec { principal: None, ..spec("User:b") },
            AclSpec { host: None, ..spec("User:c") },
        ];
        match validate_acl_create_parameters("c", &specs) {
            Err(GatewayError::Validation(message)) => assert_eq!(message, "principal is required"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_entry_never_reaches_broker() {
        let broker = Arc::new(InMemoryBroker::new("c"));
        let manager = AclManager::new(broker.clone());

        let specs = vec![spec("User:a"), AclSpec { operation: None, ..spec("User:b") }];
        assert!(manager.create_acls("c", Some(specs)).is_err());
        assert!(matches!(
            manager.create_acls("c", Some(Vec::new())),
            Err(GatewayError::InvalidPayload(_))
        ));
        assert!(matches!(
            manager.create_acls("c", None),
            Err(GatewayError::InvalidPayload(_))
        ));

        assert_eq!(broker.acl_calls(), 0);
        assert!(broker.acls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_is_submitted_once() {
        let broker = Arc::new(InMemoryBroker::new("c"));
        let manager = AclManager::new(broker.clone());

        manager
            .create_acls("c", Some(vec![spec("User:a"), spec("User:b")]))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(broker.acl_calls(), 1);
        assert_eq!(broker.acls().len(), 2);

        let found = manager
            .search_acls(AclFilter {
                principal: Some("User:b".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_broker_failure_resolves_handle() {
        let broker = Arc::new(InMemoryBroker::new("c").without_authorizer());
        let manager = AclManager::new(broker);

        let result = manager.create_acl("c", spec("User:a")).unwrap().await;
        assert!(matches!(
            result,
            Err(GatewayError::Broker(BrokerError::SecurityDisabled(_)))
        ));
    }
}
