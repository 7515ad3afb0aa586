//! sensorstats - city-level statistics over environmental sensor readings.
//!
//! # Overview
//!
//! Sensor nodes report timestamped measurements (particulate matter,
//! temperature, humidity, pressure) tagged with a city. This service
//! answers statistical queries over those readings: a current snapshot per
//! city, or a time-bucketed series over an explicit date range.
//!
//! # API Endpoints
//!
//! - `GET /v2/data/air` - Aggregated statistics per city and value type
//! - `POST /readings` - Record a sensor reading
//! - `GET /health` - Health check

use std::env;
use std::net::SocketAddr;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sensorstats::api::{AppState, get_air_stats, health_check, post_reading};
use sensorstats::storage::Storage;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
const DEFAULT_DB_PATH: &str = "sqlite:sensorstats.db?mode=rwc";

/// Default trailing window for "now" snapshot queries, in hours.
const DEFAULT_LOOKBACK_HOURS: i64 = 24;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("sensorstats=info".parse()?))
        .init();

    // Load configuration from environment
    let port: u16 = env::var("SENSORSTATS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let db_url =
        env::var("SENSORSTATS_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

    let lookback_hours: i64 = env::var("SENSORSTATS_LOOKBACK_HOURS")
        .ok()
        .and_then(|h| h.parse().ok())
        .unwrap_or(DEFAULT_LOOKBACK_HOURS);

    info!(port, db_url = %db_url, lookback_hours, "Starting sensorstats server");

    // Initialize storage
    let storage = Storage::new(&db_url).await?;
    info!("Database initialized");

    // Create application state
    let state = AppState {
        storage,
        lookback: chrono::Duration::hours(lookback_hours),
    };

    // Build router
    let app = Router::new()
        .route("/v2/data/air", get(get_air_stats))
        .route("/readings", post(post_reading))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "sensorstats is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
