//! Fleetrent Server - vehicle rental backend
//!
//! REST API server for rentals, payments and resource calendars.

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetrent_server::{
    api,
    config::{AppConfig, StorageBackend},
    repository::{memory::MemoryStore, Repository},
    services::{notifications::NotificationDispatcher, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("fleetrent_server={},tower_http=debug", config.logging.level).into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Fleetrent Server v{}", env!("CARGO_PKG_VERSION"));

    let repository = match config.database.backend {
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .connect(&config.database.url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations completed");

            Repository::postgres(pool)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on shutdown");
            Repository::memory(Arc::new(MemoryStore::new()))
        }
    };

    let (dispatcher, notification_worker) = NotificationDispatcher::spawn(
        repository.notifications.clone(),
        config.notifications.queue_capacity,
    );

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    let services = Services::new(repository, config.rentals.clone(), dispatcher);
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    let addr = SocketAddr::new(
        server_host.parse().context("Invalid host address")?,
        server_port,
    );
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last dispatcher handle; let the worker drain what is queued
    if tokio::time::timeout(Duration::from_secs(5), notification_worker).await.is_err() {
        tracing::warn!("Notification worker did not drain before shutdown");
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Rentals
        .route("/rentals", get(api::rentals::list_rentals).post(api::rentals::initiate_rental))
        .route("/rentals/quote", post(api::rentals::quote_rental))
        .route("/rentals/walk-in", post(api::rentals::initiate_walk_in))
        .route("/rentals/:id", get(api::rentals::get_rental))
        .route(
            "/rentals/:id/payments",
            get(api::rentals::list_payments).post(api::rentals::record_payment),
        )
        .route("/rentals/:id/start", post(api::rentals::start_rental))
        .route("/rentals/:id/end-signal", post(api::rentals::signal_end))
        .route("/rentals/:id/return", post(api::rentals::validate_return))
        .route("/rentals/:id/cancel", post(api::rentals::cancel_rental))
        // Schedules
        .route("/schedules", post(api::schedules::create_entry))
        .route("/schedules/:resource_type/:resource_id", get(api::schedules::future_schedule))
        .route(
            "/schedules/:resource_type/:resource_id/conflicts",
            get(api::schedules::conflicts),
        )
        // Pricing
        .route(
            "/pricing/:resource_type/:resource_id",
            get(api::pricing::get_price).put(api::pricing::set_price),
        )
        // Notifications
        .route("/notifications", get(api::notifications::list_notifications))
        .route("/notifications/unread-count", get(api::notifications::unread_count))
        .route("/notifications/:id/read", post(api::notifications::mark_read))
        .route("/notifications/:id", axum::routing::delete(api::notifications::delete_notification))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
