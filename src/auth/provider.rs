//! Pluggable identity backends
//!
//! An authenticator owns user records for one identity source and can
//! check credentials against them. Backends are registered by name at
//! startup; constraints refer to them by that name.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Result, WardenError};

/// Trait for identity backends
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Check a credential, returning the user's roles when it is accepted.
    /// Unknown users and wrong credentials both yield `None`.
    async fn login(&self, username: &str, password: &str) -> Result<Option<Vec<String>>>;

    /// Create a new user
    async fn create_user(&self, username: &str, password: &str, roles: &[String]) -> Result<()>;

    /// Update an existing user; `None` leaves the field unchanged
    async fn update_user(
        &self,
        username: &str,
        password: Option<&str>,
        roles: Option<&[String]>,
    ) -> Result<()>;

    /// Delete a user
    async fn delete_user(&self, username: &str) -> Result<()>;

    /// Backend name for logging/debugging
    fn provider_name(&self) -> &'static str;
}

/// Shared reference to an authenticator
pub type SharedAuthenticator = Arc<dyn Authenticator>;

#[derive(Default)]
struct RegistryInner {
    order: Vec<String>,
    by_name: HashMap<String, SharedAuthenticator>,
}

/// Name → authenticator map that remembers registration order
#[derive(Default)]
pub struct AuthenticatorRegistry {
    inner: RwLock<RegistryInner>,
}

impl AuthenticatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend. Re-registering a name replaces the backend but
    /// keeps its original position.
    pub fn register(&self, name: &str, authenticator: SharedAuthenticator) -> Result<()> {
        let mut inner = self.inner.write()?;
        if inner
            .by_name
            .insert(name.to_string(), authenticator)
            .is_none()
        {
            inner.order.push(name.to_string());
        }
        log::info!("Registered authenticator '{}'", name);
        Ok(())
    }

    /// Look up a backend by name
    pub fn get(&self, name: &str) -> Result<SharedAuthenticator> {
        let inner = self.inner.read()?;
        inner
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| WardenError::UnknownAuthenticator(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.inner.read()?.by_name.contains_key(name))
    }

    /// Registered names in registration order
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.inner.read()?.order.clone())
    }

    /// Snapshot of all backends in registration order
    pub fn entries(&self) -> Result<Vec<(String, SharedAuthenticator)>> {
        let inner = self.inner.read()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|name| {
                inner
                    .by_name
                    .get(name)
                    .map(|auth| (name.clone(), Arc::clone(auth)))
            })
            .collect())
    }
}
