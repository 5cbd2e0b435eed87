pub mod auth;
pub mod filters;

pub use auth::{extract_token_from_cookie, extract_token_from_query, extract_token_from_request};
pub use filters::{handle_rejection, login_filter, logout_filter, with_auth, AuthRejection};
