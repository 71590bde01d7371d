//! Resource Patterns for Endpoint Matching

use crate::error::{GatewayError, Result};
use std::fmt;

const WILDCARD: &str = "*";

/// Compiled dot-delimited resource pattern, e.g. `api.v3.topics.*`.
///
/// A trailing `*` segment matches any remaining suffix of the resource name, including
/// an empty one. Every other segment must equal the corresponding name segment exactly
/// (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePattern {
    raw: String,
    segments: Vec<String>,
    trailing_wildcard: bool,
}

impl ResourcePattern {
    /// Parse a configured pattern. Surrounding whitespace is ignored.
    pub fn parse(pattern: &str) -> Result<Self> {
        let raw = pattern.trim();
        if raw.is_empty() {
            return Err(GatewayError::InvalidConfig(
                "resource pattern cannot be empty".to_string(),
            ));
        }

        let mut segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        let trailing_wildcard = segments.last().map(String::as_str) == Some(WILDCARD);
        if trailing_wildcard {
            segments.pop();
        }

        for segment in &segments {
            if segment.is_empty() {
                return Err(GatewayError::InvalidConfig(format!(
                    "resource pattern '{}' contains an empty segment",
                    raw
                )));
            }
            if segment.contains('*') {
                return Err(GatewayError::InvalidConfig(format!(
                    "resource pattern '{}' uses a wildcard before the last segment",
                    raw
                )));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            trailing_wildcard,
        })
    }

    /// Get the pattern string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.trailing_wildcard
    }

    /// Check if this pattern matches a given resource name
    pub fn matches(&self, resource_name: &str) -> bool {
        let name: Vec<&str> = resource_name.split('.').collect();

        if self.trailing_wildcard {
            if name.len() < self.segments.len() {
                return false;
            }
        } else if name.len() != self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(name.iter())
            .all(|(expected, actual)| expected == actual)
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Match a raw pattern against a resource name. Malformed patterns match nothing.
pub fn matches(pattern: &str, resource_name: &str) -> bool {
    ResourcePattern::parse(pattern)
        .map(|p| p.matches(resource_name))
        .unwrap_or(false)
}
