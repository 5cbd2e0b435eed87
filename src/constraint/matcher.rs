//! Path → required roles lookup over an ordered, immutable rule set

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::WardenError;

/// A rule binding a request path to the roles allowed on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConstraint {
    pub path: String,
    pub roles: Vec<String>,
    pub authenticator: String,
}

/// How a constraint path is compared with a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathMatch {
    /// Request path starts with the constraint path (raw string prefix)
    #[default]
    Prefix,
    /// Request path equals the constraint path
    Exact,
}

impl PathMatch {
    pub fn matches(&self, constraint_path: &str, request_path: &str) -> bool {
        match self {
            PathMatch::Prefix => request_path.starts_with(constraint_path),
            PathMatch::Exact => request_path == constraint_path,
        }
    }
}

impl FromStr for PathMatch {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prefix" => Ok(PathMatch::Prefix),
            "exact" => Ok(PathMatch::Exact),
            other => Err(WardenError::ConfigError(format!(
                "Unknown path match policy '{}' (expected 'prefix' or 'exact')",
                other
            ))),
        }
    }
}

/// Order in which constraints are tried; the first match wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstraintOrder {
    /// Shorter paths first, ties broken lexically. Broader rules win.
    #[default]
    ShortestFirst,
    /// Longer paths first, ties broken lexically. More specific rules win.
    LongestFirst,
}

impl ConstraintOrder {
    pub fn compare(&self, a: &LoginConstraint, b: &LoginConstraint) -> Ordering {
        // Length in characters, not bytes
        let by_len = a.path.chars().count().cmp(&b.path.chars().count());
        let by_len = match self {
            ConstraintOrder::ShortestFirst => by_len,
            ConstraintOrder::LongestFirst => by_len.reverse(),
        };
        by_len.then_with(|| a.path.cmp(&b.path))
    }
}

impl FromStr for ConstraintOrder {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "shortest_first" => Ok(ConstraintOrder::ShortestFirst),
            "longest_first" => Ok(ConstraintOrder::LongestFirst),
            other => Err(WardenError::ConfigError(format!(
                "Unknown constraint order '{}' (expected 'shortest_first' or 'longest_first')",
                other
            ))),
        }
    }
}

/// A sorted constraint snapshot. Never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<LoginConstraint>,
    path_match: PathMatch,
}

impl ConstraintSet {
    /// Sorts `constraints` by `order` and freezes them
    pub fn new(mut constraints: Vec<LoginConstraint>, order: ConstraintOrder, path_match: PathMatch) -> Self {
        constraints.sort_by(|a, b| order.compare(a, b));
        Self {
            constraints,
            path_match,
        }
    }

    /// First constraint, in stored order, whose path matches `request_path`
    pub fn find(&self, request_path: &str) -> Option<&LoginConstraint> {
        self.constraints
            .iter()
            .find(|c| self.path_match.matches(&c.path, request_path))
    }

    pub fn constraints(&self) -> &[LoginConstraint] {
        &self.constraints
    }

    pub fn path_match(&self) -> PathMatch {
        self.path_match
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}
