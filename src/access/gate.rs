//! Endpoint Access Control Gate
//!
//! Admission is decided by a short chain of stages evaluated in order; the first stage that
//! reaches a verdict ends the chain:
//!
//! 1. `OPTIONS` is always admitted (pre-flight).
//! 2. A blocklist match denies with [`DenyReason::Blocked`].
//! 3. A non-empty allowlist that does not match denies with [`DenyReason::NotAllowlisted`].
//!
//! Anything that falls through is admitted.

use super::{AccessDecision, AccessRuleSet, DenialKind, DenyReason};
use crate::types::RequestIdentity;
use std::sync::Arc;
use tracing::{debug, trace};

enum Stage {
    Decided(AccessDecision),
    Continue,
}

type StageFn = fn(&AccessRuleSet, &RequestIdentity) -> Stage;

const STAGES: [(&str, StageFn); 3] = [
    ("preflight", preflight_stage),
    ("blocklist", blocklist_stage),
    ("allowlist", allowlist_stage),
];

fn preflight_stage(_: &AccessRuleSet, identity: &RequestIdentity) -> Stage {
    if identity.http_method.eq_ignore_ascii_case("OPTIONS") {
        Stage::Decided(AccessDecision::Allow)
    } else {
        Stage::Continue
    }
}

fn blocklist_stage(rules: &AccessRuleSet, identity: &RequestIdentity) -> Stage {
    match rules.find_block(&identity.resource_name) {
        Some(rule) => {
            trace!("{} matched block pattern {}", identity, rule.pattern);
            Stage::Decided(AccessDecision::Deny(DenyReason::Blocked))
        }
        None => Stage::Continue,
    }
}

fn allowlist_stage(rules: &AccessRuleSet, identity: &RequestIdentity) -> Stage {
    if rules.has_allowlist() && rules.find_allow(&identity.resource_name).is_none() {
        Stage::Decided(AccessDecision::Deny(DenyReason::NotAllowlisted))
    } else {
        Stage::Continue
    }
}

/// Allow/deny evaluator shared by every request handler.
///
/// The rule set is read-only after construction, so the gate can be cloned freely and
/// evaluated concurrently without locking.
#[derive(Debug, Clone)]
pub struct AccessControlGate {
    rules: Arc<AccessRuleSet>,
}

impl AccessControlGate {
    pub fn new(rules: AccessRuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    pub fn unrestricted() -> Self {
        Self::new(AccessRuleSet::unrestricted())
    }

    pub fn rules(&self) -> &AccessRuleSet {
        &self.rules
    }

    pub fn evaluate(&self, identity: &RequestIdentity) -> AccessDecision {
        for (name, stage) in STAGES.iter() {
            if let Stage::Decided(decision) = stage(&self.rules, identity) {
                debug!("Access for {} decided by {} stage: {:?}", identity, name, decision);
                return decision;
            }
        }
        AccessDecision::Allow
    }

    /// Decide how a denied request surfaces. `siblings` are the other methods registered
    /// on the same route; if any of them is admitted the route itself is reachable and only
    /// this method is withheld.
    pub fn classify_denial(&self, siblings: &[RequestIdentity]) -> DenialKind {
        let reachable = siblings
            .iter()
            .filter(|s| !s.http_method.eq_ignore_ascii_case("OPTIONS"))
            .any(|s| self.evaluate(s).is_allowed());
        if reachable {
            DenialKind::MethodNotAllowed
        } else {
            DenialKind::NotFound
        }
    }
}
