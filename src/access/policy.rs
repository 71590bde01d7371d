//! Access Decision Types

use std::fmt;

/// Why a request was refused admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// The resource matched a blocklist pattern
    Blocked,

    /// An allowlist is configured and the resource matched none of it
    NotAllowlisted,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Blocked => "blocked",
            DenyReason::NotAllowlisted => "not allowlisted",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate decision for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    pub fn denial_reason(&self) -> Option<DenyReason> {
        match self {
            AccessDecision::Deny(reason) => Some(*reason),
            AccessDecision::Allow => None,
        }
    }
}

/// How a denial surfaces at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    /// The route exists but this particular method is withheld (405)
    MethodNotAllowed,

    /// Every method on the route is inaccessible (404)
    NotFound,
}
