//! HTTP gateway for cbtsim.
//!
//! Exposes the turn-processing entry point (`POST /chat`), health and status
//! probes, and session inspection/reset endpoints.
//!
//! Built on Axum for high performance async HTTP.

pub mod services;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Path};
use axum::http::HeaderValue;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use cbtsim_config::{AppConfig, GatewayConfig};
use cbtsim_core::error::SessionError;
use cbtsim_core::session::{TurnRequest, TurnResponse};
use cbtsim_session::{SessionController, TurnError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

pub use services::{Services, assemble, build_services};

/// Body returned when a therapeutic turn fails. Carries no internal detail.
pub const GENERIC_APOLOGY: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again in a moment.";

/// Shared application state for the gateway.
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub provider_name: String,
    pub retrieval_backend: String,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(services: &Services) -> Self {
        Self {
            controller: services.controller.clone(),
            provider_name: services.provider_name.clone(),
            retrieval_backend: services.retrieval_backend.clone(),
            start_time: Utc::now(),
        }
    }
}

type SharedState = Arc<AppState>;

/// Build the router with all routes and layers.
///
/// Layers applied:
/// - Request body size limit
/// - In-memory sliding-window rate limiting per client (health exempt)
/// - CORS for localhost front-ends
/// - HTTP trace logging
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _: &axum::http::request::Parts| {
            is_local_origin(origin.as_bytes())
        }))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    let rate_limiter = Arc::new(RateLimiter::new(
        gateway.rate_limit_per_minute,
        std::time::Duration::from_secs(60),
    ));

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/sessions/{id}", get(session_handler).delete(clear_session_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.max_body_bytes))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn is_local_origin(origin: &[u8]) -> bool {
    ["http://localhost", "http://127.0.0.1"].iter().any(|prefix| {
        origin
            .strip_prefix(prefix.as_bytes())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(b":"))
    })
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let services = build_services(&config)?;
    let state = Arc::new(AppState::new(&services));
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, provider = %services.provider_name, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key (peer address).
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: std::time::Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<std::time::Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: std::time::Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the client is within its budget.
    fn check(&self, client_key: &str) -> bool {
        let now = std::time::Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Keyed by peer IP; requests without connection info share one bucket.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let client_key = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&client_key) {
        warn!(client = %client_key, "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

// --- Errors ---

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::Session(e @ SessionError::Ended { .. }) => ApiError::new(StatusCode::CONFLICT, e.to_string()),
            TurnError::Session(e @ SessionError::InvalidRequest(_)) => {
                ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
            }
            TurnError::Pipeline(_) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_APOLOGY),
        }
    }
}

// --- Handlers ---

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<TurnResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;

    info!(
        session_id = %request.session_id,
        message_len = request.message.len(),
        end_session = request.end_session,
        "Chat turn received"
    );

    match state.controller.process_turn(request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            if matches!(e, TurnError::Pipeline(_)) {
                error!(error = %e, "Chat turn failed");
            }
            Err(e.into())
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
    active_sessions: usize,
    provider: String,
    retrieval_backend: String,
}

async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
        active_sessions: state.controller.store().len().await,
        provider: state.provider_name.clone(),
        retrieval_backend: state.retrieval_backend.clone(),
    })
}

#[derive(Serialize)]
struct SessionInfo {
    session_id: String,
    message_count: usize,
    ended: bool,
    has_summary: bool,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

async fn session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    let session = state
        .controller
        .store()
        .snapshot(&id)
        .await
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Session '{id}' not found")))?;

    Ok(Json(SessionInfo {
        session_id: session.id,
        message_count: session.message_count,
        ended: session.ended,
        has_summary: !session.summary.is_empty(),
        created_at: session.created_at,
        last_updated: session.last_updated,
    }))
}

async fn clear_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    let cleared = state.controller.store().clear(&id).await;
    Json(serde_json::json!({ "cleared": cleared }))
}
