//! # n8n Relay HTTP Service
//!
//! HTTP server relaying chat queries and DingTalk robot callbacks to n8n
//! workflows.
//!
//! This service provides:
//! - `POST /api/n8n/query`: chat query forwarded to the n8n Chat Trigger,
//!   answered with a normalized `{success, message, result}` envelope
//! - `GET /api/n8n/health`: service status plus an optional n8n probe
//! - `POST /dingTalk/getMsg`: signature-checked DingTalk callback relayed to n8n
//! - `GET /metrics`: Prometheus metrics

pub mod config;
pub mod errors;
pub mod forwarder;
pub mod metrics;
pub mod responses;

pub use config::{DingTalkConfig, LoggingConfig, N8nConfig, ServerConfig, ServiceConfig};
pub use errors::{ConfigError, DingTalkHandlerError, QueryHandlerError, ServiceError};
pub use forwarder::{
    ForwardError, HealthProbe, HttpWebhookForwarder, WebhookForwarder, WebhookRoute,
};
pub use metrics::ServiceMetrics;
pub use responses::{HealthResponse, ResultEnvelope};

use axum::{
    extract::{rejection::JsonRejection, MatchedPath, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use n8n_relay_core::{
    normalize_body, payload::OutboundChatPayload, ChatQuery, DingTalkCallback,
    DingTalkSignatureVerifier, SignatureError, Timestamp, ValidationError,
};
use responses::{DINGTALK_ACCEPTED, DINGTALK_REJECTED, QUERY_SUCCESS_MESSAGE, SERVICE_NAME};
use serde_json::Value;
use std::{future::IntoFuture, sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
///
/// Immutable after startup; every request reads it, none mutates it.
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Outbound client for the n8n webhooks
    pub forwarder: Arc<dyn WebhookForwarder>,

    /// DingTalk callback signature verifier
    pub verifier: Arc<DingTalkSignatureVerifier>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        forwarder: Arc<dyn WebhookForwarder>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        let verifier = DingTalkSignatureVerifier::with_max_skew(
            config.dingtalk.app_secret.clone(),
            config.dingtalk.max_clock_skew_ms,
        );

        Self {
            config: Arc::new(config),
            forwarder,
            verifier: Arc::new(verifier),
            metrics,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let relay_routes = Router::new()
        .route("/api/n8n/query", post(handle_query))
        .route("/api/n8n/health", get(handle_health));

    let dingtalk_routes = Router::new().route("/dingTalk/getMsg", post(handle_dingtalk_message));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    let router = Router::new()
        .merge(relay_routes)
        .merge(dingtalk_routes)
        .merge(observability_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http());

    let router = if state.config.server.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}

/// Start HTTP server
///
/// Builds the n8n forwarder and metrics from `config`, binds
/// `server.host:server.port` and serves until SIGINT/SIGTERM. In-flight
/// requests get `server.shutdown_timeout_seconds` to finish.
pub async fn start_server(config: ServiceConfig) -> Result<(), ServiceError> {
    let forwarder = HttpWebhookForwarder::new(config.n8n.clone()).map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: e.to_string(),
        })
    })?;

    let metrics = ServiceMetrics::new().map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to initialize metrics: {}", e),
        })
    })?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::new(config, Arc::new(forwarder), Arc::new(metrics));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", address);

    // The server stops accepting connections on the signal, then drains
    // in-flight requests until the timeout.
    let shutdown_started = Arc::new(tokio::sync::Notify::new());
    let notify = shutdown_started.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!(
            "Initiating graceful shutdown with {}s timeout",
            shutdown_timeout.as_secs()
        );
        notify.notify_one();
    });

    let drain_deadline = async {
        shutdown_started.notified().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server.into_future() => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = drain_deadline => {
            warn!("Graceful shutdown timed out; abandoning in-flight requests");
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// Chat Query Handlers
// ============================================================================

/// Handle a natural-language query
///
/// 1. Reject blank queries with 400 before anything is sent to n8n
/// 2. POST `{chatInput, sessionId, action, timestamp}` to the chat webhook
/// 3. Normalize whatever n8n answered into a single `result`
#[instrument(skip(state, body))]
pub async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<ChatQuery>, JsonRejection>,
) -> Result<Json<ResultEnvelope>, QueryHandlerError> {
    let Json(request) = body.map_err(|rejection| QueryHandlerError::InvalidBody {
        message: rejection.body_text(),
    })?;
    let input = request.validate()?;

    info!(query = %input.as_str(), "Processing chat query");

    let payload = OutboundChatPayload::new(&input, Timestamp::now());
    let outbound = serde_json::to_value(&payload).map_err(|e| QueryHandlerError::Downstream {
        message: e.to_string(),
    })?;

    info!(
        url = %state.forwarder.webhook_url(WebhookRoute::ChatQuery),
        session_id = %payload.session_id,
        "Calling n8n webhook"
    );

    let raw = forward_timed(&state, WebhookRoute::ChatQuery, &outbound).await?;
    let result = normalize_body(&raw);

    info!(response_len = raw.len(), "n8n query answered");

    Ok(Json(ResultEnvelope::success(QUERY_SUCCESS_MESSAGE, result)))
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Service health, plus the n8n probe result when a probe URL is configured
///
/// Always 200: n8n being down is reported in the body, not the status.
#[instrument(skip(state))]
pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut response = HealthResponse {
        status: "UP".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: Timestamp::now(),
        n8n_webhook_url: state
            .forwarder
            .webhook_url(WebhookRoute::ChatQuery)
            .to_string(),
        n8n_status: None,
        n8n_error: None,
    };

    match state.forwarder.probe_health().await {
        HealthProbe::NotConfigured => {}
        HealthProbe::Up => response.n8n_status = Some("UP".to_string()),
        HealthProbe::Down { error } => {
            warn!(error = ?error, "n8n health probe failed");
            response.n8n_status = Some("DOWN".to_string());
            response.n8n_error = error;
        }
    }

    Json(response)
}

// ============================================================================
// DingTalk Handlers
// ============================================================================

/// Handle a DingTalk outgoing-robot callback
///
/// Answers `success` once the message has been relayed to n8n. A callback
/// failing signature or timestamp verification is answered with the
/// `非法请求` sentinel and HTTP 200, and is not relayed. The body is only
/// parsed once the signature has been accepted.
#[instrument(skip(state, headers, body))]
pub async fn handle_dingtalk_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, DingTalkHandlerError> {
    let sign = header_str(&headers, "sign");
    let timestamp = header_str(&headers, "timestamp");

    if let Err(e) = state.verifier.verify(sign, timestamp, Timestamp::now()) {
        if e.is_caller_fault() {
            warn!(reason = %e, "Rejected DingTalk callback");
        } else {
            error!(reason = %e, "DingTalk signature verification is misconfigured");
        }
        state.metrics.record_signature_rejection(rejection_reason(&e));
        return Ok(DINGTALK_REJECTED);
    }

    let callback: DingTalkCallback =
        serde_json::from_slice(&body).map_err(|e| ValidationError::InvalidFormat {
            field: "body".to_string(),
            message: e.to_string(),
        })?;
    let message = callback.message()?;

    info!(
        group = ?message.conversation_title,
        sender = ?message.sender_nick,
        content = %message.content,
        "Received DingTalk message"
    );

    let payload = serde_json::to_value(message.to_relay_payload(Timestamp::now())).map_err(
        |e| DingTalkHandlerError::InternalError {
            message: e.to_string(),
        },
    )?;

    let response = forward_timed(&state, WebhookRoute::DingTalk, &payload).await?;

    info!(
        content = %message.content,
        n8n_response = %String::from_utf8_lossy(&response),
        "Relayed DingTalk message to n8n"
    );

    Ok(DINGTALK_ACCEPTED)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn rejection_reason(error: &SignatureError) -> &'static str {
    match error {
        SignatureError::MissingHeader { .. } => "missing_header",
        SignatureError::InvalidTimestamp { .. } => "invalid_timestamp",
        SignatureError::TimestampOutOfWindow { .. } => "timestamp_out_of_window",
        SignatureError::Mismatch => "mismatch",
        SignatureError::InvalidKey => "invalid_key",
    }
}

/// Forward through the configured forwarder, recording latency and failures.
async fn forward_timed(
    state: &AppState,
    route: WebhookRoute,
    payload: &Value,
) -> Result<Bytes, ForwardError> {
    let start = std::time::Instant::now();
    let result = state.forwarder.forward(route, payload).await;
    state
        .metrics
        .record_forward(route.as_str(), start.elapsed(), result.is_ok());
    result
}

// ============================================================================
// Observability Handlers
// ============================================================================

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.render().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Header carrying the per-request correlation id.
const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Longest caller-supplied correlation id that is reused.
const MAX_CORRELATION_ID_LEN: usize = 128;

/// Request logging middleware with correlation ID tracking
///
/// Reuses the caller's `x-correlation-id` when it is short and made of
/// token characters, otherwise generates a UUID. The id and the matched
/// route template are recorded on the request span, and the id is echoed
/// in the response. Completion is logged at a level chosen by status class.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    route,
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = std::time::Instant::now();
    let route = matched_route(&request);

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| is_usable_correlation_id(id))
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::Span::current();
    span.record("route", route.as_str());
    span.record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }

    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;
    if status.is_server_error() {
        error!(status = status.as_u16(), duration_ms, "Relay request failed");
    } else if status.is_client_error() {
        warn!(status = status.as_u16(), duration_ms, "Relay request rejected");
    } else {
        info!(status = status.as_u16(), duration_ms, "Relay request completed");
    }

    response
}

fn is_usable_correlation_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_CORRELATION_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'))
}

/// Route template of the request, or [`metrics::UNMATCHED_ROUTE`].
fn matched_route(request: &axum::extract::Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| metrics::UNMATCHED_ROUTE.to_string())
}

/// Count requests per route template and status.
async fn metrics_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let route = matched_route(&request);

    let response = next.run(request).await;
    state
        .metrics
        .record_http_request(&route, response.status().as_u16());

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
