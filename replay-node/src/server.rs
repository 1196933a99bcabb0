use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        Html, IntoResponse, Json,
    },
    routing::get,
    Router,
};
use chrono::Utc;
use futures::StreamExt;
use metrics::{describe_counter, describe_gauge};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

use crate::catalog::EventCatalog;
use crate::inference::ScoringSummary;
use crate::transport::{open_session, SessionCounter, TransportSettings};

/// Dashboard page, served verbatim
const DASHBOARD_PAGE: &str = include_str!("../static/dashboard.html");

/// Shared application state; everything here is read-only or atomic
#[derive(Debug, Clone)]
pub struct AppState {
    /// Scored replay sequence
    pub catalog: EventCatalog,
    /// Stream pacing and buffering
    pub transport: TransportSettings,
    /// Open stream sessions
    pub sessions: SessionCounter,
}

impl AppState {
    pub fn new(catalog: EventCatalog, transport: TransportSettings) -> Self {
        Self {
            catalog,
            transport,
            sessions: SessionCounter::default(),
        }
    }
}

/// Response of `/api/v1/summary`
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    /// Scoring statistics over the whole replay sequence
    pub scoring: ScoringSummary,
    /// Events each session replays
    pub events: usize,
    /// Currently open stream sessions
    pub active_sessions: usize,
    /// Delay between events of one session
    pub pacing_interval_ms: u64,
}

/// Create the router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/stream", get(stream_events))
        .route("/health", get(health_check))
        .route("/api/v1/summary", get(summary))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router on an already-bound listener until the process stops
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!(listen_addr = %addr, events = state.catalog.len(), "Replay server listening");

    axum::serve(listener, create_router(state))
        .await
        .context("Replay server error")
}

/// Dashboard page that opens the push connection
async fn dashboard_page() -> Html<&'static str> {
    Html(DASHBOARD_PAGE)
}

/// Long-lived push stream of prediction events, one session per request
#[instrument(skip(state))]
async fn stream_events(State(state): State<AppState>) -> impl IntoResponse {
    let session = open_session(state.catalog.clone(), &state.transport, &state.sessions);
    let events = session.map(|payload| Ok::<_, Infallible>(Event::default().data(payload)));
    Sse::new(events)
}

/// Health check endpoint
#[instrument(skip(state))]
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "timestamp": Utc::now(),
            "version": env!("CARGO_PKG_VERSION"),
            "events": state.catalog.len()
        })),
    )
}

#[instrument(skip(state))]
async fn summary(State(state): State<AppState>) -> Json<SummaryResponse> {
    Json(SummaryResponse {
        scoring: state.catalog.summary().clone(),
        events: state.catalog.len(),
        active_sessions: state.sessions.active(),
        pacing_interval_ms: state.transport.pacing_interval.as_millis() as u64,
    })
}

/// Initialize metrics descriptions
pub fn initialize_metrics() {
    describe_counter!(
        "replay_sessions_opened_total",
        "Total number of stream sessions opened"
    );
    describe_counter!(
        "replay_sessions_closed_total",
        "Total number of stream sessions closed"
    );
    describe_counter!(
        "replay_events_emitted_total",
        "Total number of events handed to stream clients"
    );
    describe_counter!(
        "replay_events_dropped_total",
        "Total number of events dropped because a client fell behind"
    );
    describe_gauge!(
        "replay_active_sessions",
        "Current number of open stream sessions"
    );
}

/// Start Prometheus metrics exporter
pub fn start_metrics_exporter(addr: SocketAddr) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(metrics_addr = %addr, "Prometheus metrics exporter started");
    Ok(())
}
