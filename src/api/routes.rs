use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use super::handlers;
use crate::broker::{KafkaMessageConsumer, KafkaMessageProducer};
use crate::observability::HealthChecker;
use crate::services::OperationExecutor;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub produce_executor: Arc<OperationExecutor<KafkaMessageProducer>>,
    pub consume_executor: Arc<OperationExecutor<KafkaMessageConsumer>>,
    pub health_checker: Arc<HealthChecker>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(
        produce_executor: Arc<OperationExecutor<KafkaMessageProducer>>,
        consume_executor: Arc<OperationExecutor<KafkaMessageConsumer>>,
        health_checker: Arc<HealthChecker>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            produce_executor,
            consume_executor,
            health_checker,
            metrics_handle,
        }
    }
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::liveness_check))
        .route("/health/ready", get(handlers::readiness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Message operation endpoints
        .route("/messages/produce", post(handlers::produce_message))
        .route("/messages/consume", post(handlers::consume_message))
        .with_state(state)
}
