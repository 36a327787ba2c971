use mq_probe::api::{create_router, AppState};
use mq_probe::broker::{ConnectorConfig, KafkaConnector, KafkaMessageConsumer, KafkaMessageProducer};
use mq_probe::config::Settings;
use mq_probe::idempotency::{IdempotencyCoordinator, PostgresRecordStore, RecordSweeper};
use mq_probe::observability::{init_logging, init_metrics, HealthChecker, LogFormat};
use mq_probe::services::OperationExecutor;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;

    // Initialize logging
    init_logging(&settings.log.level, LogFormat::from(settings.log.format.as_str()));
    info!("Configuration loaded");

    // Connect to PostgreSQL
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database.url)
        .await?;
    info!("Database connection established");

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied successfully");

    // Record store, background sweeper and coordinator
    let store = PostgresRecordStore::new(pool.clone());
    RecordSweeper::new(store.clone(), settings.idempotency.sweep_interval()).start();
    let coordinator = Arc::new(IdempotencyCoordinator::new(
        Arc::new(store),
        settings.idempotency.default_ttl(),
    ));

    // Broker adapters and per-kind executors
    let connector = Arc::new(KafkaConnector::new(ConnectorConfig {
        default_endpoints: settings.broker.endpoint_list(),
        max_fetch_bytes: settings.broker.max_fetch_bytes,
    }));
    let produce_executor = Arc::new(OperationExecutor::new(
        KafkaMessageProducer::new(connector.clone()),
        coordinator.clone(),
    ));
    let consume_executor = Arc::new(OperationExecutor::new(
        KafkaMessageConsumer::new(connector.clone()),
        coordinator,
    ));

    let metrics_handle = init_metrics();
    let health_checker = Arc::new(HealthChecker::new(pool, connector));

    let state = AppState::new(
        produce_executor,
        consume_executor,
        health_checker,
        metrics_handle,
    );

    // Outermost layer runs first: stamp a request id, trace, then echo the id
    // back on responses.
    let app = create_router(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = settings.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
