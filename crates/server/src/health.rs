use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use dogebot_core::{CounterSnapshot, MetricsSink};
use dogebot_slack::socket::ConnectionState;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    metrics: Arc<dyn MetricsSink>,
    connection: watch::Receiver<ConnectionState>,
}

impl HealthState {
    pub fn new(metrics: Arc<dyn MetricsSink>, connection: watch::Receiver<ConnectionState>) -> Self {
        Self { metrics, connection }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub transport: &'static str,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/debug/vars", get(debug_vars))
        .with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(event_name = "system.health.start", bind_address = %address, "debug endpoint started");

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                error = %error,
                "debug endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let transport = *state.connection.borrow();
    let ready = transport == ConnectionState::Connected;

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: "dogebot",
        transport: transport.as_str(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

/// Lifetime counters, shaped like Go's expvar output.
pub async fn debug_vars(State(state): State<HealthState>) -> Json<CounterSnapshot> {
    Json(state.metrics.snapshot())
}
