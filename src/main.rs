use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;

use medauth::auth::SessionIssuer;
use medauth::configuration::{get_configuration, StoreBackend};
use medauth::startup::run;
use medauth::store::Stores;
use medauth::telemetry::init_telemetry;

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

    let stores = match configuration.store {
        StoreBackend::Postgres => {
            tracing::info!("Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(configuration.database.max_connections)
                .connect(&configuration.database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;

            sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
            })?;

            tracing::info!("Database connection pool created successfully");
            Stores::postgres(pool)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on restart");
            Stores::in_memory()
        }
    };

    // An unusable signing secret stops startup before anything is served.
    let sessions = SessionIssuer::from_settings(&configuration.auth, stores.credentials.clone())
        .map_err(|e| {
            tracing::error!("Failed to initialize token signing: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Signing key error")
        })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(
        listener,
        stores,
        sessions,
        configuration.auth,
        configuration.application.allowed_origins,
    )?;
    tracing::info!("Server started successfully");

    server.await
}
