// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9200;

// Constraint backing
pub const DEFAULT_CONSTRAINT_TABLE: &str = "security";
pub const DEFAULT_CONSTRAINT_KIND: &str = "constraint";

// Token storage and lifetime
pub const DEFAULT_TOKEN_TABLE: &str = "auth";
pub const DEFAULT_TOKEN_KIND: &str = "token";
pub const DEFAULT_TOKEN_PARAM: &str = "token";
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 1000 * 60 * 30;

// Default identity backend
pub const DEFAULT_AUTHENTICATOR_NAME: &str = "index";
pub const DEFAULT_USER_TABLE: &str = "auth";
pub const DEFAULT_USER_KIND: &str = "user";

// Login / logout flow
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_LOGOUT_PATH: &str = "/logout";

// Upper bound on any single document store call
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5000;
