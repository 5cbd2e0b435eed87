use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{DEFAULT_TOKEN_KIND, DEFAULT_TOKEN_TABLE};
use crate::error::{Result, WardenError};
use crate::storage::{Document, Durability, SharedDocumentStore};

/// Persisted session token record, keyed by token id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(rename = "lastModified", default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// Fresh record stamped with the current time
    pub fn new(roles: &[String]) -> Self {
        Self {
            roles: roles.to_vec(),
            last_modified: Some(Utc::now()),
        }
    }

    /// Whether the record has been idle longer than `timeout` at `now`.
    /// A record without a timestamp counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: ChronoDuration) -> bool {
        match self.last_modified {
            Some(last_modified) => now.signed_duration_since(last_modified) > timeout,
            None => true,
        }
    }

    /// Any-of role check
    pub fn grants_any(&self, required: &[String]) -> bool {
        required.iter().any(|role| self.roles.contains(role))
    }

    fn into_document(self) -> Result<Document> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(WardenError::SerializationError(
                "Token record did not serialize to an object".to_string(),
            )),
        }
    }
}

/// Generates an opaque token id: SHA-512 hex digest of a random v4 UUID
pub fn generate_token_id() -> String {
    let seed = uuid::Uuid::new_v4();
    let digest = Sha512::digest(seed.as_bytes());
    format!("{:x}", digest)
}

/// Short, log-safe form of a token id
pub fn token_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(idx, _)| idx)
        .unwrap_or(token.len());
    &token[..end]
}

/// Manages the session token lifecycle against the document store
pub struct TokenManager {
    store: SharedDocumentStore,
    table: String,
    kind: String,
    session_timeout: ChronoDuration,
}

impl TokenManager {
    /// Creates a token manager storing tokens in the default table/kind
    pub fn new(store: SharedDocumentStore, session_timeout: Duration) -> Self {
        Self {
            store,
            table: DEFAULT_TOKEN_TABLE.to_string(),
            kind: DEFAULT_TOKEN_KIND.to_string(),
            session_timeout: ChronoDuration::milliseconds(
                i64::try_from(session_timeout.as_millis()).unwrap_or(i64::MAX),
            ),
        }
    }

    /// Override where token records are kept
    pub fn with_location(mut self, table: impl Into<String>, kind: impl Into<String>) -> Self {
        self.table = table.into();
        self.kind = kind.into();
        self
    }

    pub fn session_timeout(&self) -> ChronoDuration {
        self.session_timeout
    }

    /// Issues a new token bound to `roles`.
    ///
    /// The record is written with immediate durability so that a validation
    /// issued right after this call returns sees it.
    pub async fn create_token(&self, roles: &[String]) -> Result<String> {
        let token = generate_token_id();
        let document = TokenRecord::new(roles).into_document()?;
        self.store
            .put(&self.table, &self.kind, &token, document, Durability::Immediate)
            .await?;
        log::debug!("Issued token {}… with roles {:?}", token_prefix(&token), roles);
        Ok(token)
    }

    /// Checks that `token` exists, is not idle past the session timeout and
    /// carries at least one of `required_roles`.
    ///
    /// Expired records are deleted on sight by a background task; the answer
    /// never waits on that delete, and a failed delete is only logged.
    pub async fn authenticate(&self, token: &str, required_roles: &[String]) -> Result<bool> {
        let document = match self.store.get(&self.table, &self.kind, token).await? {
            Some(doc) => doc,
            None => {
                log::debug!("Token {}… not found", token_prefix(token));
                return Ok(false);
            }
        };

        let record = match serde_json::from_value::<TokenRecord>(serde_json::Value::Object(document)) {
            Ok(record) if !record.is_expired(Utc::now(), self.session_timeout) => record,
            Ok(_) => {
                log::debug!("Token {}… expired", token_prefix(token));
                self.expire(token);
                return Ok(false);
            }
            Err(e) => {
                log::warn!("Token {}… has an unreadable record: {}", token_prefix(token), e);
                self.expire(token);
                return Ok(false);
            }
        };

        Ok(record.grants_any(required_roles))
    }

    /// Revokes a token; fails with `TokenNotFound` if it does not exist
    pub async fn delete_token(&self, token: &str) -> Result<()> {
        let found = self
            .store
            .delete(&self.table, &self.kind, token, Durability::Immediate)
            .await?;
        if !found {
            return Err(WardenError::TokenNotFound(token.to_string()));
        }
        log::debug!("Revoked token {}…", token_prefix(token));
        Ok(())
    }

    fn expire(&self, token: &str) {
        let store = Arc::clone(&self.store);
        let table = self.table.clone();
        let kind = self.kind.clone();
        let token = token.to_string();

        tokio::spawn(async move {
            if let Err(e) = store
                .delete(&table, &kind, &token, Durability::Immediate)
                .await
            {
                log::warn!("Failed to delete expired token {}…: {}", token_prefix(&token), e);
            }
        });
    }
}
