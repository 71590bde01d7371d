//! Access Rules and Rule Sets
//!
//! Rule sets are built once from the comma-separated allow/block lists and never change.

use super::ResourcePattern;
use crate::error::Result;

/// Whether a rule admits or rejects matching resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Allow,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub pattern: ResourcePattern,
    pub kind: RuleKind,
}

impl AccessRule {
    pub fn new(pattern: ResourcePattern, kind: RuleKind) -> Self {
        Self { pattern, kind }
    }

    pub fn matches(&self, resource_name: &str) -> bool {
        self.pattern.matches(resource_name)
    }
}

/// Immutable allow/block rules for endpoint admission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRuleSet {
    allow: Vec<AccessRule>,
    block: Vec<AccessRule>,
}

impl AccessRuleSet {
    /// A rule set that admits everything.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Build from comma-separated lists. Blank lists and blank entries are ignored.
    pub fn from_lists(allowlist: &str, blocklist: &str) -> Result<Self> {
        Ok(Self {
            allow: parse_list(allowlist, RuleKind::Allow)?,
            block: parse_list(blocklist, RuleKind::Block)?,
        })
    }

    pub fn from_patterns<A, B>(allowlist: A, blocklist: B) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        let allow = allowlist
            .into_iter()
            .map(|p| ResourcePattern::parse(p.as_ref()).map(|p| AccessRule::new(p, RuleKind::Allow)))
            .collect::<Result<Vec<_>>>()?;
        let block = blocklist
            .into_iter()
            .map(|p| ResourcePattern::parse(p.as_ref()).map(|p| AccessRule::new(p, RuleKind::Block)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { allow, block })
    }

    pub fn allow_rules(&self) -> &[AccessRule] {
        &self.allow
    }

    pub fn block_rules(&self) -> &[AccessRule] {
        &self.block
    }

    pub fn has_allowlist(&self) -> bool {
        !self.allow.is_empty()
    }

    /// First block rule matching the resource, if any
    pub fn find_block(&self, resource_name: &str) -> Option<&AccessRule> {
        self.block.iter().find(|r| r.matches(resource_name))
    }

    /// First allow rule matching the resource, if any
    pub fn find_allow(&self, resource_name: &str) -> Option<&AccessRule> {
        self.allow.iter().find(|r| r.matches(resource_name))
    }
}

fn parse_list(list: &str, kind: RuleKind) -> Result<Vec<AccessRule>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| ResourcePattern::parse(entry).map(|p| AccessRule::new(p, kind)))
        .collect()
}
