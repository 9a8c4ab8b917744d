//! HTTP endpoint server using Axum

use axum::{
    body::Bytes,
    extract::{RawQuery, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use url::form_urlencoded;

use crate::config::RelayConfig;
use crate::core::service::{HealthReport, RelayError, RelayService, SERVER_NAME};
use crate::metrics::Metrics;
use crate::signals::{DecodeDiagnostics, InboundSignal, SignalPoll};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RelayService>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
}

impl AppState {
    pub fn new(config: &RelayConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            service: Arc::new(RelayService::new(config).with_metrics(metrics.clone())),
            metrics,
            start_time: Arc::new(Instant::now()),
        }
    }
}

#[derive(Serialize)]
struct DecodeErrorBody<'a> {
    error: String,
    #[serde(flatten)]
    diagnostics: &'a DecodeDiagnostics,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            RelayError::Decode(failure) => {
                let body = DecodeErrorBody {
                    error: failure.to_string(),
                    diagnostics: &failure.diagnostics,
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            RelayError::Validation(e) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
            }
        }
    }
}

/// Receive a signal from a producer
async fn submit_signal(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Json<Value>, RelayError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    let inbound =
        InboundSignal::from_body(content_type, content_length, query.as_deref(), body).await;
    let id = state.service.submit_signal(&inbound)?;

    Ok(Json(json!({ "status": "ok", "id": id })))
}

/// `last_id` that does not parse as an integer is ignored.
fn last_seen_id(query: Option<&str>) -> Option<u64> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == "last_id")
        .and_then(|(_, v)| v.parse().ok())
}

/// Latest signal for a consumer, or 204 when there is nothing new
async fn fetch_signal(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    match state.service.fetch_signal(last_seen_id(query.as_deref())) {
        SignalPoll::Fresh(signal) => Json(signal).into_response(),
        SignalPoll::Unchanged | SignalPoll::Empty => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn signal_history(State(state): State<AppState>) -> Response {
    Json(state.service.fetch_history()).into_response()
}

async fn submit_account_status(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, RelayError> {
    let account_id = state.service.submit_account_status(&body)?;
    Ok(Json(json!({ "status": "ok", "account_id": account_id })))
}

async fn list_accounts(State(state): State<AppState>) -> Response {
    Json(state.service.list_accounts(Utc::now())).into_response()
}

#[derive(Serialize)]
struct HealthBody {
    #[serde(flatten)]
    report: HealthReport,
    uptime_seconds: u64,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        report: state.service.health(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /api/signal": "Receive signals from producers",
            "GET /api/signal": "Get latest signal for consumers",
            "GET /api/signals/history": "Get signal history",
            "POST /api/account/status": "Receive account status heartbeats",
            "GET /api/accounts": "List live accounts",
            "GET /health": "Health check"
        },
        "status": "running"
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/signal", post(submit_signal).get(fetch_signal))
        .route("/api/signals/history", get(signal_history))
        .route("/api/account/status", post(submit_account_status))
        .route("/api/accounts", get(list_accounts))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(
    port: u16,
    config: RelayConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let metrics = Arc::new(Metrics::new()?);
    let state = AppState::new(&config, metrics);
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(
        port = port,
        history_capacity = config.history_capacity,
        stale_after_secs = config.stale_after.as_secs(),
        "HTTP server listening on port {}",
        port
    );
    axum::serve(listener, app).await?;

    Ok(())
}
