use std::net::TcpListener;
use std::sync::Arc;

use keygate::auth::TokenCodec;
use keygate::configuration::get_configuration;
use keygate::startup::{ensure_default_admin, run};
use keygate::store::{PgStore, SessionStore, UserStore};
use keygate::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let codec = TokenCodec::from_settings(&configuration.jwt).map_err(|e| {
        tracing::error!("Failed to build token codec: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Token codec error")
    })?;

    tracing::info!("Attempting to connect to database");

    let store = PgStore::connect(&configuration.database)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    store.migrate().await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
    })?;

    tracing::info!("Database ready");

    let store = Arc::new(store);
    let users: Arc<dyn UserStore> = store.clone();
    let sessions: Arc<dyn SessionStore> = store;

    ensure_default_admin(users.as_ref()).await.map_err(|e| {
        tracing::error!("Failed to seed default admin: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Admin seeding error")
    })?;

    let address = format!("127.0.0.1:{}", configuration.application.port);
    tracing::info!("Binding server to address: {}", address);

    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, codec, users, sessions)?;
    tracing::info!("Server started successfully");

    let _ = server.await;

    Ok(())
}
