//! Authentication service
//!
//! Composes the authenticator registry, the token lifecycle and the
//! constraint resolver. Build one `AuthService` at startup and share it
//! (behind an `Arc`) with every request handler.

use std::sync::Arc;
use warp::http::Uri;

use crate::auth::{AuthenticatorRegistry, IndexAuthenticator, SharedAuthenticator, TokenManager};
use crate::config::AuthConfig;
use crate::constants::DEFAULT_AUTHENTICATOR_NAME;
use crate::constraint::{ConstraintResolver, ConstraintSet, LoginConstraint, ReloadStats};
use crate::error::Result;
use crate::handlers::auth::extract_token_from_request;
use crate::storage::{DeadlineStore, SharedDocumentStore};

/// Result of checking a request path against the active constraints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// No constraint covers the path
    Unconstrained,
    /// The token holds one of the required roles
    Granted(LoginConstraint),
    /// Missing, expired or insufficient token
    Denied(LoginConstraint),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, AccessDecision::Denied(_))
    }
}

pub type SharedAuthService = Arc<AuthService>;

/// The authentication/authorization core
pub struct AuthService {
    config: AuthConfig,
    registry: AuthenticatorRegistry,
    tokens: TokenManager,
    constraints: ConstraintResolver,
}

impl AuthService {
    /// Builds the service and registers the store-backed default
    /// authenticator. Every store call made through the service is bounded
    /// by `config.store_timeout`.
    pub fn new(config: AuthConfig, store: SharedDocumentStore) -> Result<Self> {
        config.validate()?;
        log::info!("Creating authenticators.");

        let store: SharedDocumentStore = Arc::new(DeadlineStore::new(store, config.store_timeout));

        let mut index = IndexAuthenticator::new(Arc::clone(&store));
        if let Some(ref table) = config.user_table {
            index = index.with_table(table.clone());
        }
        if let Some(ref kind) = config.user_kind {
            index = index.with_kind(kind.clone());
        }

        let registry = AuthenticatorRegistry::new();
        registry.register(DEFAULT_AUTHENTICATOR_NAME, Arc::new(index))?;

        let tokens = TokenManager::new(Arc::clone(&store), config.session_timeout)
            .with_location(config.token_table.clone(), config.token_kind.clone());

        let constraints = ConstraintResolver::new(
            store,
            config.constraint_table.clone(),
            config.constraint_kind.clone(),
            config.constraint_order,
            config.path_match,
        );

        Ok(Self {
            config,
            registry,
            tokens,
            constraints,
        })
    }

    /// Loads the initial constraint set so the first request is checked
    /// against real rules
    pub async fn start(&self) -> Result<ReloadStats> {
        log::info!("Starting AuthService.");
        self.reload().await
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn register_authenticator(&self, name: &str, authenticator: SharedAuthenticator) -> Result<()> {
        self.registry.register(name, authenticator)
    }

    pub fn get_authenticator(&self, name: &str) -> Result<SharedAuthenticator> {
        self.registry.get(name)
    }

    /// Registered authenticator names, in registration order
    pub fn authenticator_names(&self) -> Result<Vec<String>> {
        self.registry.names()
    }

    pub async fn reload(&self) -> Result<ReloadStats> {
        self.constraints.reload(&self.registry).await
    }

    pub fn constraints(&self) -> Arc<ConstraintSet> {
        self.constraints.snapshot()
    }

    /// Constraint governing `path`, `None` when the path is unconstrained
    pub fn match_constraint(&self, path: &str) -> Option<LoginConstraint> {
        self.constraints.find(path)
    }

    pub async fn create_token(&self, roles: &[String]) -> Result<String> {
        self.tokens.create_token(roles).await
    }

    pub async fn authenticate(&self, token: &str, roles: &[String]) -> Result<bool> {
        self.tokens.authenticate(token, roles).await
    }

    pub async fn delete_token(&self, token: &str) -> Result<()> {
        self.tokens.delete_token(token).await
    }

    /// Decides whether a request for `path` carrying `token` may proceed
    pub async fn authorize(&self, path: &str, token: Option<&str>) -> Result<AccessDecision> {
        let constraint = match self.match_constraint(path) {
            Some(c) => c,
            None => return Ok(AccessDecision::Unconstrained),
        };

        let allowed = match token {
            Some(token) => self.authenticate(token, &constraint.roles).await?,
            None => false,
        };

        if allowed {
            Ok(AccessDecision::Granted(constraint))
        } else {
            log::debug!("Access to {} denied (requires one of {:?})", path, constraint.roles);
            Ok(AccessDecision::Denied(constraint))
        }
    }

    /// Checks credentials against each authenticator in registration order
    /// and issues a token for the first one that accepts them
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<String>> {
        for (name, authenticator) in self.registry.entries()? {
            if let Some(roles) = authenticator.login(username, password).await? {
                log::info!("User '{}' logged in via '{}'", username, name);
                return self.create_token(&roles).await.map(Some);
            }
        }
        log::debug!("Login rejected for '{}'", username);
        Ok(None)
    }

    pub async fn create_user(
        &self,
        authenticator: &str,
        username: &str,
        password: &str,
        roles: &[String],
    ) -> Result<()> {
        self.get_authenticator(authenticator)?
            .create_user(username, password, roles)
            .await
    }

    pub async fn update_user(
        &self,
        authenticator: &str,
        username: &str,
        password: Option<&str>,
        roles: Option<&[String]>,
    ) -> Result<()> {
        self.get_authenticator(authenticator)?
            .update_user(username, password, roles)
            .await
    }

    pub async fn delete_user(&self, authenticator: &str, username: &str) -> Result<()> {
        self.get_authenticator(authenticator)?
            .delete_user(username)
            .await
    }

    /// Token carried by a request, read from the configured query parameter
    pub fn extract_token_from_request(&self, uri: &Uri) -> Option<String> {
        extract_token_from_request(uri, &self.config.token_param)
    }
}

impl Drop for AuthService {
    fn drop(&mut self) {
        log::info!("Closing AuthService.");
    }
}
