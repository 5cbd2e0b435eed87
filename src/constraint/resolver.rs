//! Loads constraint records from the store and publishes them as a snapshot
//!
//! Reload is tolerant of bad records: each one is checked on its own and
//! skipped with a warning, so a single broken record never blocks the rest.
//! The compiled set replaces the previous one in a single pointer swap;
//! readers holding the old snapshot finish against it undisturbed.

use arc_swap::ArcSwap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::matcher::{ConstraintOrder, ConstraintSet, LoginConstraint, PathMatch};
use crate::auth::AuthenticatorRegistry;
use crate::error::{Result, WardenError};
use crate::storage::{Document, SharedDocumentStore, StoredDocument};

/// Why a constraint record was left out of the active set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingPaths,
    MissingRoles,
    MissingAuthenticator,
    UnknownAuthenticator(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPaths => write!(f, "no paths"),
            Self::MissingRoles => write!(f, "no roles"),
            Self::MissingAuthenticator => write!(f, "no authenticator"),
            Self::UnknownAuthenticator(name) => write!(f, "unknown authenticator '{}'", name),
        }
    }
}

/// Outcome of a reload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReloadStats {
    /// Records turned into constraints
    pub accepted: usize,
    /// Records dropped as malformed
    pub skipped: usize,
    /// Constraints in the new set (one per accepted path)
    pub constraints: usize,
}

fn string_list(source: &Document, field: &str) -> Vec<String> {
    match source.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Validates one record and expands it into a constraint per path
pub fn expand_record(
    source: &Document,
    registry: &AuthenticatorRegistry,
) -> Result<std::result::Result<Vec<LoginConstraint>, SkipReason>> {
    let paths = string_list(source, "paths");
    if paths.is_empty() {
        return Ok(Err(SkipReason::MissingPaths));
    }
    let roles = string_list(source, "roles");
    if roles.is_empty() {
        return Ok(Err(SkipReason::MissingRoles));
    }
    let authenticator = match source.get("authenticator").and_then(Value::as_str) {
        Some(name) => name.to_string(),
        None => return Ok(Err(SkipReason::MissingAuthenticator)),
    };
    if !registry.contains(&authenticator)? {
        return Ok(Err(SkipReason::UnknownAuthenticator(authenticator)));
    }

    Ok(Ok(paths
        .into_iter()
        .map(|path| LoginConstraint {
            path,
            roles: roles.clone(),
            authenticator: authenticator.clone(),
        })
        .collect()))
}

/// Owns the active constraint snapshot
pub struct ConstraintResolver {
    store: SharedDocumentStore,
    table: String,
    kind: String,
    order: ConstraintOrder,
    path_match: PathMatch,
    active: ArcSwap<ConstraintSet>,
}

impl ConstraintResolver {
    pub fn new(
        store: SharedDocumentStore,
        table: impl Into<String>,
        kind: impl Into<String>,
        order: ConstraintOrder,
        path_match: PathMatch,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            kind: kind.into(),
            order,
            path_match,
            active: ArcSwap::from_pointee(ConstraintSet::new(Vec::new(), order, path_match)),
        }
    }

    /// Re-reads every constraint record and swaps in the compiled set.
    ///
    /// Fails with `ConstraintBackingMissing` when the table does not exist;
    /// the active set is left untouched in that case.
    pub async fn reload(&self, registry: &AuthenticatorRegistry) -> Result<ReloadStats> {
        let records = match self.store.search(&self.table, &self.kind).await {
            Ok(records) => records,
            Err(WardenError::TableNotFound(_)) => {
                log::error!("{}/{} is not found", self.table, self.kind);
                return Err(WardenError::ConstraintBackingMissing {
                    table: self.table.clone(),
                    kind: self.kind.clone(),
                });
            }
            Err(e) => return Err(e),
        };

        let mut stats = ReloadStats::default();
        let mut constraints = Vec::new();
        for StoredDocument { id, source } in &records {
            match expand_record(source, registry)? {
                Ok(expanded) => {
                    stats.accepted += 1;
                    constraints.extend(expanded);
                }
                Err(reason) => {
                    stats.skipped += 1;
                    log::warn!(
                        "Invalid login constraint {} ({}): {}",
                        id,
                        reason,
                        Value::Object(source.clone())
                    );
                }
            }
        }

        let set = ConstraintSet::new(constraints, self.order, self.path_match);
        stats.constraints = set.len();
        self.active.store(Arc::new(set));

        log::info!(
            "Loaded {} login constraints from {}/{} ({} records accepted, {} skipped)",
            stats.constraints,
            self.table,
            self.kind,
            stats.accepted,
            stats.skipped
        );
        Ok(stats)
    }

    /// Current snapshot; stays valid even if a reload swaps in a new one
    pub fn snapshot(&self) -> Arc<ConstraintSet> {
        self.active.load_full()
    }

    /// Applicable constraint for a request path, `None` if unconstrained
    pub fn find(&self, request_path: &str) -> Option<LoginConstraint> {
        self.active.load().find(request_path).cloned()
    }
}
