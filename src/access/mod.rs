//! Endpoint Access Control
//!
//! Pattern-based allow/block admission for REST endpoints, evaluated against the canonical
//! resource name of each route (e.g. `api.v3.topics.delete`) before any handler runs.
//! Independent of the broker-level ACLs managed through `/acls`.

pub mod gate;
pub mod patterns;
pub mod policy;
pub mod rules;

pub use gate::AccessControlGate;
pub use patterns::{matches, ResourcePattern};
pub use policy::{AccessDecision, DenialKind, DenyReason};
pub use rules::{AccessRule, AccessRuleSet, RuleKind};
