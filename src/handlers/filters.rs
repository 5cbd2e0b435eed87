//! warp filters wiring the service into an HTTP front end
//!
//! `login_filter` and `logout_filter` answer on their configured path and
//! methods only. `with_auth` guards everything else: requests on a
//! constrained path must carry a token holding one of the required roles.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::filters::path::FullPath;
use warp::http::{Method, StatusCode};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::error::WardenError;
use crate::handlers::auth::extract_token_from_query;
use crate::service::{AccessDecision, SharedAuthService};

/// Largest accepted login body
const MAX_LOGIN_BODY: u64 = 16 * 1024;

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    status: &'static str,
    token: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

/// Reasons the filters turn a request away
#[derive(Debug)]
pub enum AuthRejection {
    MissingToken,
    Forbidden,
    InvalidCredentials,
    Service(WardenError),
}

impl warp::reject::Reject for AuthRejection {}

impl AuthRejection {
    fn status(&self) -> StatusCode {
        match self {
            AuthRejection::MissingToken | AuthRejection::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AuthRejection::Forbidden => StatusCode::FORBIDDEN,
            AuthRejection::Service(e) => e.status(),
        }
    }

    fn message(&self) -> String {
        match self {
            AuthRejection::MissingToken => "Authentication token is required".to_string(),
            AuthRejection::Forbidden => "Access denied".to_string(),
            AuthRejection::InvalidCredentials => "Invalid username or password".to_string(),
            AuthRejection::Service(e) => e.to_string(),
        }
    }
}

fn service_failure(err: WardenError) -> Rejection {
    if err.status().is_server_error() {
        log::error!("Request failed: {}", err);
    }
    warp::reject::custom(AuthRejection::Service(err))
}

fn with_service(
    service: SharedAuthService,
) -> impl Filter<Extract = (SharedAuthService,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

/// Raw query string, empty when the request has none
fn raw_query() -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::query::raw()
        .or(warp::any().map(String::new))
        .unify()
}

/// Passes only requests for exactly `path` using one of `methods` (any
/// method when the list is empty)
fn route_gate(
    path: String,
    methods: Vec<Method>,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    let path: Arc<str> = Arc::from(path);
    let methods = Arc::new(methods);
    warp::path::full()
        .and(warp::method())
        .and_then(move |full: FullPath, method: Method| {
            let path = Arc::clone(&path);
            let methods = Arc::clone(&methods);
            async move {
                if full.as_str() == &*path && (methods.is_empty() || methods.contains(&method)) {
                    Ok(())
                } else {
                    Err(warp::reject::not_found())
                }
            }
        })
        .untuple_one()
}

/// Login: checks credentials and answers with a fresh token
pub fn login_filter(
    service: SharedAuthService,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let path = service.config().login_path.clone();
    let methods = service.config().login_methods.clone();

    // Once the gate matches, every outcome is answered here
    let login = warp::body::content_length_limit(MAX_LOGIN_BODY)
        .and(warp::body::json())
        .and(with_service(service))
        .and_then(handle_login)
        .recover(handle_rejection)
        .unify();

    route_gate(path, methods).and(login)
}

async fn handle_login(
    request: LoginRequest,
    service: SharedAuthService,
) -> Result<Response, Rejection> {
    match service.login(&request.username, &request.password).await {
        Ok(Some(token)) => Ok(warp::reply::json(&TokenResponse { status: "ok", token }).into_response()),
        Ok(None) => Err(warp::reject::custom(AuthRejection::InvalidCredentials)),
        Err(e) => Err(service_failure(e)),
    }
}

/// Logout: revokes the token carried by the request
pub fn logout_filter(
    service: SharedAuthService,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let path = service.config().logout_path.clone();
    let methods = service.config().logout_methods.clone();

    let logout = raw_query()
        .and(with_service(service))
        .and_then(handle_logout)
        .recover(handle_rejection)
        .unify();

    route_gate(path, methods).and(logout)
}

async fn handle_logout(query: String, service: SharedAuthService) -> Result<Response, Rejection> {
    let token = extract_token_from_query(&query, &service.config().token_param).ok_or_else(|| {
        service_failure(WardenError::ValidationError(
            "No token in request".to_string(),
        ))
    })?;

    service
        .delete_token(&token)
        .await
        .map_err(service_failure)?;
    Ok(warp::reply::json(&StatusResponse { status: "ok" }).into_response())
}

/// Guard: lets the request through unchanged when no constraint applies or
/// the token satisfies the matching constraint
pub fn with_auth(
    service: SharedAuthService,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::path::full()
        .and(raw_query())
        .and(with_service(service))
        .and_then(check_access)
        .untuple_one()
}

async fn check_access(
    path: FullPath,
    query: String,
    service: SharedAuthService,
) -> Result<(), Rejection> {
    let token = extract_token_from_query(&query, &service.config().token_param);

    match service
        .authorize(path.as_str(), token.as_deref())
        .await
        .map_err(service_failure)?
    {
        AccessDecision::Unconstrained | AccessDecision::Granted(_) => Ok(()),
        AccessDecision::Denied(_) if token.is_none() => {
            Err(warp::reject::custom(AuthRejection::MissingToken))
        }
        AccessDecision::Denied(_) => Err(warp::reject::custom(AuthRejection::Forbidden)),
    }
}

/// Renders rejections as JSON error bodies
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if let Some(rejection) = err.find::<AuthRejection>() {
        (rejection.status(), rejection.message())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length is required".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            status: "error",
            message,
        }),
        status,
    )
    .into_response())
}
