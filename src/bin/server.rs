use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

use rusty_warden::config::AuthConfig;
use rusty_warden::constants::DEFAULT_AUTHENTICATOR_NAME;
use rusty_warden::handlers::{handle_rejection, login_filter, logout_filter, with_auth};
use rusty_warden::service::AuthService;
use rusty_warden::storage::MemoryDocumentStore;

#[tokio::main]
async fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Initialize logging
    env_logger::init();

    let config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, constraints={}/{}, session_timeout={}ms",
        config.host,
        config.port,
        config.constraint_table,
        config.constraint_kind,
        config.session_timeout.as_millis()
    );

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    // The in-memory store starts empty; make sure the constraint backing exists
    let store = Arc::new(MemoryDocumentStore::new());
    store.create_table(&config.constraint_table).await;

    let service = match AuthService::new(config, store) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Failed to create auth service: {}", e);
            std::process::exit(1);
        }
    };

    if let Ok(password) = std::env::var("RUSTY_WARDEN_ADMIN_PASSWORD") {
        match service
            .create_user(DEFAULT_AUTHENTICATOR_NAME, "admin", &password, &["admin".to_string()])
            .await
        {
            Ok(()) => info!("Seeded admin user"),
            Err(e) => warn!("Failed to seed admin user: {}", e),
        }
    }

    if let Err(e) = service.start().await {
        error!("Failed to start auth service: {}", e);
        std::process::exit(1);
    }

    // Stand-in for the protected data service
    let content = with_auth(service.clone()).map(|| "OK");

    let routes = login_filter(service.clone())
        .or(logout_filter(service.clone()))
        .or(content)
        .recover(handle_rejection);

    info!("Starting Rusty Warden on {}", addr);
    warp::serve(routes).run(addr).await;
}
