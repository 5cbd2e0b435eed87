//! Service configuration module
//! Handles the tunable parameters of the authentication layer

use crate::constants::{
    DEFAULT_CONSTRAINT_KIND, DEFAULT_CONSTRAINT_TABLE, DEFAULT_HOST, DEFAULT_LOGIN_PATH,
    DEFAULT_LOGOUT_PATH, DEFAULT_PORT, DEFAULT_SESSION_TIMEOUT_MS, DEFAULT_STORE_TIMEOUT_MS,
    DEFAULT_TOKEN_KIND, DEFAULT_TOKEN_PARAM, DEFAULT_TOKEN_TABLE,
};
use crate::constraint::{ConstraintOrder, PathMatch};
use crate::error::{Result, WardenError};
use std::env;
use std::time::Duration;
use warp::http::Method;

/// Authentication layer configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub host: String,
    pub port: u16,
    /// Table holding constraint records
    pub constraint_table: String,
    /// Kind of constraint documents within that table
    pub constraint_kind: String,
    /// Idle time after which a token is treated as expired
    pub session_timeout: Duration,
    pub token_table: String,
    pub token_kind: String,
    /// Query parameter carrying the token
    pub token_param: String,
    /// Storage location for the default authenticator; `None` keeps the backend default
    pub user_table: Option<String>,
    pub user_kind: Option<String>,
    pub login_path: String,
    /// Methods that trigger login; empty means any method
    pub login_methods: Vec<Method>,
    pub logout_path: String,
    pub logout_methods: Vec<Method>,
    pub path_match: PathMatch,
    pub constraint_order: ConstraintOrder,
    /// Upper bound on every document store call
    pub store_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            constraint_table: DEFAULT_CONSTRAINT_TABLE.to_string(),
            constraint_kind: DEFAULT_CONSTRAINT_KIND.to_string(),
            session_timeout: Duration::from_millis(DEFAULT_SESSION_TIMEOUT_MS),
            token_table: DEFAULT_TOKEN_TABLE.to_string(),
            token_kind: DEFAULT_TOKEN_KIND.to_string(),
            token_param: DEFAULT_TOKEN_PARAM.to_string(),
            user_table: None,
            user_kind: None,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            login_methods: Vec::new(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
            logout_methods: Vec::new(),
            path_match: PathMatch::default(),
            constraint_order: ConstraintOrder::default(),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

/// Parses a comma separated method list; unknown names are dropped
pub fn parse_methods(value: &str) -> Vec<Method> {
    value
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .filter_map(|m| match m.to_lowercase().as_str() {
            "get" => Some(Method::GET),
            "post" => Some(Method::POST),
            "head" => Some(Method::HEAD),
            "options" => Some(Method::OPTIONS),
            "put" => Some(Method::PUT),
            "delete" => Some(Method::DELETE),
            _ => {
                log::warn!("Ignoring unsupported HTTP method '{}'", m);
                None
            }
        })
        .collect()
}

fn env_millis(key: &str, default: u64) -> Result<Duration> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| {
                WardenError::ConfigError(format!("{} must be a number of milliseconds, got '{}'", key, raw))
            }),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

impl AuthConfig {
    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        if self.session_timeout.is_zero() {
            return Err(WardenError::ConfigError(
                "Session timeout must be greater than zero".to_string(),
            ));
        }
        if self.store_timeout.is_zero() {
            return Err(WardenError::ConfigError(
                "Store timeout must be greater than zero".to_string(),
            ));
        }
        if self.constraint_table.is_empty() || self.token_table.is_empty() {
            return Err(WardenError::ConfigError(
                "Constraint and token tables must be named".to_string(),
            ));
        }
        if self.token_param.is_empty() {
            return Err(WardenError::ConfigError(
                "Token parameter name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = env::var("RUSTY_WARDEN_HOST").unwrap_or(defaults.host);
        let port = env::var("RUSTY_WARDEN_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let constraint_table =
            env::var("RUSTY_WARDEN_CONSTRAINT_TABLE").unwrap_or(defaults.constraint_table);
        let constraint_kind =
            env::var("RUSTY_WARDEN_CONSTRAINT_KIND").unwrap_or(defaults.constraint_kind);

        let session_timeout = env_millis("RUSTY_WARDEN_SESSION_TIMEOUT_MS", DEFAULT_SESSION_TIMEOUT_MS)?;
        let store_timeout = env_millis("RUSTY_WARDEN_STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)?;

        let token_table = env::var("RUSTY_WARDEN_TOKEN_TABLE").unwrap_or(defaults.token_table);
        let token_kind = env::var("RUSTY_WARDEN_TOKEN_KIND").unwrap_or(defaults.token_kind);
        let token_param = env::var("RUSTY_WARDEN_TOKEN_PARAM").unwrap_or(defaults.token_param);

        let user_table = env::var("RUSTY_WARDEN_USER_TABLE").ok();
        let user_kind = env::var("RUSTY_WARDEN_USER_KIND").ok();

        let login_path = env::var("RUSTY_WARDEN_LOGIN_PATH").unwrap_or(defaults.login_path);
        let login_methods = env::var("RUSTY_WARDEN_LOGIN_METHODS")
            .map(|v| parse_methods(&v))
            .unwrap_or_default();
        let logout_path = env::var("RUSTY_WARDEN_LOGOUT_PATH").unwrap_or(defaults.logout_path);
        let logout_methods = env::var("RUSTY_WARDEN_LOGOUT_METHODS")
            .map(|v| parse_methods(&v))
            .unwrap_or_default();

        let path_match = match env::var("RUSTY_WARDEN_MATCH_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.path_match,
        };
        let constraint_order = match env::var("RUSTY_WARDEN_CONSTRAINT_ORDER") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.constraint_order,
        };

        let config = Self {
            host,
            port,
            constraint_table,
            constraint_kind,
            session_timeout,
            token_table,
            token_kind,
            token_param,
            user_table,
            user_kind,
            login_path,
            login_methods,
            logout_path,
            logout_methods,
            path_match,
            constraint_order,
            store_timeout,
        };
        config.validate()?;
        Ok(config)
    }
}
