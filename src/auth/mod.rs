//! Authentication: session tokens and identity backends

pub mod provider;
pub mod token;
pub mod user;

// Re-export main components
pub use provider::{Authenticator, AuthenticatorRegistry, SharedAuthenticator};
pub use token::{generate_token_id, TokenManager, TokenRecord};
pub use user::{IndexAuthenticator, UserRecord};
