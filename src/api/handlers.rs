use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::api::requests::{ConsumeMessageRequest, ProduceMessageRequest, ValidationError};
use crate::api::responses::{
    ApiResponse, ErrorResponse, MessageOperationResponse, ValidationErrorDetail,
};
use crate::error::AppError;
use crate::observability::ApplicationHealth;

use super::routes::AppState;

/// Optional header that, when present, must match the body's key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
/// Optional header overriding the record TTL for this request, in seconds.
pub const IDEMPOTENCY_EXPIRY_HEADER: &str = "idempotency-expiry-seconds";

type ErrorReply = (StatusCode, Json<ApiResponse<()>>);

fn validation_failure(errors: Vec<ValidationError>) -> ErrorReply {
    let details: Vec<ValidationErrorDetail> = errors
        .iter()
        .map(|e| ValidationErrorDetail {
            field: e.field.clone(),
            message: e.message.clone(),
        })
        .collect();

    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(
            ErrorResponse::new("VALIDATION_ERROR", "Request validation failed")
                .with_details(details),
        )),
    )
}

fn bad_request(message: impl Into<String>) -> ErrorReply {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(ErrorResponse::new(
            "VALIDATION_ERROR",
            message,
        ))),
    )
}

/// Applies the idempotency header rules and extracts the TTL override.
///
/// The `Idempotency-Key` header is optional but must agree with the body when
/// given. Overrides of zero or less are passed through; the coordinator falls
/// back to the default TTL for those.
fn idempotency_headers(
    headers: &HeaderMap,
    body_key: &str,
) -> Result<Option<chrono::Duration>, ErrorReply> {
    if let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) {
        let header_key = value
            .to_str()
            .map_err(|_| bad_request("Idempotency-Key header is not valid text"))?;
        // A blank header counts as absent.
        if !header_key.trim().is_empty() && header_key != body_key {
            return Err(bad_request(
                "Idempotency-Key header does not match the request body key",
            ));
        }
    }

    match headers.get(IDEMPOTENCY_EXPIRY_HEADER) {
        Some(value) => {
            let seconds = value
                .to_str()
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .ok_or_else(|| {
                    bad_request("Idempotency-Expiry-Seconds header must be an integer")
                })?;
            Ok(Some(chrono::Duration::seconds(seconds)))
        }
        None => Ok(None),
    }
}

/// Produce messages onto a queue, deduplicated by idempotency key.
pub async fn produce_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ProduceMessageRequest>,
) -> Result<Json<ApiResponse<MessageOperationResponse>>, ErrorReply> {
    if let Err(errors) = request.validate() {
        return Err(validation_failure(errors));
    }
    let ttl_override = idempotency_headers(&headers, &request.idempotency_key)?;
    let command = request.to_command();

    match state
        .produce_executor
        .run_with_ttl(&command, ttl_override)
        .await
    {
        Ok(result) => Ok(Json(ApiResponse::success(MessageOperationResponse::from(
            result,
        )))),
        Err(AppError::Conflict(msg)) => Err((
            StatusCode::CONFLICT,
            Json(ApiResponse::<()>::error(ErrorResponse::new("CONFLICT", msg))),
        )),
        Err(AppError::Operation(msg)) => Err((
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::<()>::error(ErrorResponse::new("BROKER_ERROR", msg))),
        )),
        Err(AppError::Validation(msg)) => Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(ErrorResponse::new("VALIDATION_ERROR", msg))),
        )),
        Err(e) => {
            tracing::error!("Failed to produce messages: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error(ErrorResponse::new(
                    "INTERNAL_ERROR",
                    "An internal error occurred",
                ))),
            ))
        }
    }
}

/// Consume messages from a queue, deduplicated by idempotency key.
pub async fn consume_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ConsumeMessageRequest>,
) -> Result<Json<ApiResponse<MessageOperationResponse>>, ErrorReply> {
    if let Err(errors) = request.validate() {
        return Err(validation_failure(errors));
    }
    let ttl_override = idempotency_headers(&headers, &request.idempotency_key)?;
    let command = request.to_command();

    match state
        .consume_executor
        .run_with_ttl(&command, ttl_override)
        .await
    {
        Ok(result) => Ok(Json(ApiResponse::success(MessageOperationResponse::from(
            result,
        )))),
        Err(AppError::Conflict(msg)) => Err((
            StatusCode::CONFLICT,
            Json(ApiResponse::<()>::error(ErrorResponse::new("CONFLICT", msg))),
        )),
        Err(AppError::Operation(msg)) => Err((
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::<()>::error(ErrorResponse::new("BROKER_ERROR", msg))),
        )),
        Err(AppError::Validation(msg)) => Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(ErrorResponse::new("VALIDATION_ERROR", msg))),
        )),
        Err(e) => {
            tracing::error!("Failed to consume messages: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error(ErrorResponse::new(
                    "INTERNAL_ERROR",
                    "An internal error occurred",
                ))),
            ))
        }
    }
}

/// Full health aggregate across the record store and the default cluster.
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<ApplicationHealth>> {
    let health = state.health_checker.check_all().await;
    Json(ApiResponse::success(health))
}

/// Readiness check endpoint.
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    if state.health_checker.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Liveness check endpoint.
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus exposition endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}
