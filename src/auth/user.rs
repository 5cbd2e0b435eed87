//! Store-backed default identity backend
//!
//! Users are kept as documents keyed by username. Passwords are stored as
//! argon2 PHC strings; the hash parameters travel inside the string, so
//! verification does not depend on the current defaults.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::auth::provider::Authenticator;
use crate::constants::{DEFAULT_USER_KIND, DEFAULT_USER_TABLE};
use crate::error::{Result, WardenError};
use crate::storage::{Document, Durability, SharedDocumentStore};

/// Persisted user record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// argon2 PHC hash of the password
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(rename = "lastModified")]
    pub last_modified: DateTime<Utc>,
}

impl UserRecord {
    fn into_document(self) -> Result<Document> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(WardenError::SerializationError(
                "User record did not serialize to an object".to_string(),
            )),
        }
    }

    fn from_document(document: Document) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(document))?)
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WardenError::PasswordHashError(e.to_string()))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Hash checked when the user does not exist, so unknown and known
/// usernames cost the same argon2 verification
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("rusty-warden-absent-user").ok())
        .as_deref()
}

/// Default authenticator backed by the document store
pub struct IndexAuthenticator {
    store: SharedDocumentStore,
    table: String,
    kind: String,
}

impl IndexAuthenticator {
    pub fn new(store: SharedDocumentStore) -> Self {
        Self {
            store,
            table: DEFAULT_USER_TABLE.to_string(),
            kind: DEFAULT_USER_KIND.to_string(),
        }
    }

    /// Override the table users are stored in
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Override the kind users are stored under
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    async fn load(&self, username: &str) -> Result<Option<UserRecord>> {
        match self.store.get(&self.table, &self.kind, username).await? {
            Some(doc) => UserRecord::from_document(doc).map(Some),
            None => Ok(None),
        }
    }

    async fn save_new(&self, username: &str, record: UserRecord) -> Result<bool> {
        self.store
            .insert(
                &self.table,
                &self.kind,
                username,
                record.into_document()?,
                Durability::Immediate,
            )
            .await
    }

    async fn save(&self, username: &str, record: UserRecord) -> Result<()> {
        self.store
            .put(
                &self.table,
                &self.kind,
                username,
                record.into_document()?,
                Durability::Immediate,
            )
            .await
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(WardenError::ValidationError("Username must not be empty".to_string()));
    }
    Ok(())
}

#[async_trait]
impl Authenticator for IndexAuthenticator {
    async fn login(&self, username: &str, password: &str) -> Result<Option<Vec<String>>> {
        let record = match self.load(username).await? {
            Some(record) => record,
            None => {
                if let Some(hash) = dummy_hash() {
                    verify_password(password, hash);
                }
                log::debug!("Login for unknown user '{}'", username);
                return Ok(None);
            }
        };

        if verify_password(password, &record.password) {
            Ok(Some(record.roles))
        } else {
            log::debug!("Password mismatch for user '{}'", username);
            Ok(None)
        }
    }

    async fn create_user(&self, username: &str, password: &str, roles: &[String]) -> Result<()> {
        validate_username(username)?;

        let record = UserRecord {
            password: hash_password(password)?,
            roles: roles.to_vec(),
            last_modified: Utc::now(),
        };
        if !self.save_new(username, record).await? {
            return Err(WardenError::UserAlreadyExists(username.to_string()));
        }
        log::info!("Created user '{}' with roles {:?}", username, roles);
        Ok(())
    }

    async fn update_user(
        &self,
        username: &str,
        password: Option<&str>,
        roles: Option<&[String]>,
    ) -> Result<()> {
        let mut record = self
            .load(username)
            .await?
            .ok_or_else(|| WardenError::UserNotFound(username.to_string()))?;

        if let Some(password) = password {
            record.password = hash_password(password)?;
        }
        if let Some(roles) = roles {
            record.roles = roles.to_vec();
        }
        record.last_modified = Utc::now();

        self.save(username, record).await?;
        log::info!("Updated user '{}'", username);
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        let found = self
            .store
            .delete(&self.table, &self.kind, username, Durability::Immediate)
            .await?;
        if !found {
            return Err(WardenError::UserNotFound(username.to_string()));
        }
        log::info!("Deleted user '{}'", username);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "INDEX"
    }
}
