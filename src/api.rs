//! HTTP API handlers for sensorstats.
//!
//! The handlers are a thin boundary: they inject the current time, run
//! validation, expand an unfiltered query to the known cities, and hand the
//! plan to the aggregation engine. Validation failures come back as HTTP
//! 400 with the field-keyed error map as the body; store failures come back
//! as HTTP 503 so callers know a retry may succeed.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::aggregation::aggregate;
use crate::error::EngineError;
use crate::model::{AirQuery, AirStatsResponse, Reading, ReadingRequest};
use crate::storage::Storage;
use crate::validate::validate;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,

    /// Trailing window used for "now" snapshot queries that carry no date
    /// range.
    pub lookback: chrono::Duration,
}

/// GET /v2/data/air - Aggregated air statistics per city.
///
/// # Query Parameters
///
/// - `city` (optional): comma-separated city names; defaults to all known cities
/// - `value_type` (optional): comma-separated channels (P1, P2, temperature, humidity, pressure)
/// - `from`, `to` (optional): date range, `Y-m-d`; `to` requires `from`
/// - `avg` (optional): bucket granularity (minute, hour, day, month)
///
/// # Response
///
/// Without a date range, one snapshot per value type:
///
/// ```json
/// {
///     "count": 1,
///     "results": [
///         {
///             "city_name": "Dar es Salaam",
///             "P2": {"average": 2.75, "minimum": 0.0, "maximum": 8.0, "sample_count": 12}
///         }
///     ]
/// }
/// ```
///
/// With a date range, each value type is a series in descending bucket
/// order, every entry carrying `start_datetime`/`end_datetime`.
#[instrument(skip(state))]
pub async fn get_air_stats(
    State(state): State<AppState>,
    Query(query): Query<AirQuery>,
) -> Response {
    match air_stats(&state, &query).await {
        Ok(response) => {
            info!(cities = response.count, "Air stats queried");
            Json(response).into_response()
        }
        Err(EngineError::Validation(e)) => {
            warn!(field = e.field, message = %e.message, "Rejected air stats query");
            (StatusCode::BAD_REQUEST, Json(e)).into_response()
        }
        Err(EngineError::DataSource(e)) => {
            warn!(error = %e, "Failed to aggregate air stats");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

/// Validate, expand an unfiltered query to every known city, aggregate.
async fn air_stats(state: &AppState, query: &AirQuery) -> Result<AirStatsResponse, EngineError> {
    let mut plan = validate(query, Utc::now(), state.lookback)?;

    if plan.cities.is_empty() {
        plan.cities = state.storage.list_cities().await?;
    }

    let results = aggregate(&state.storage, &plan).await?;
    Ok(AirStatsResponse {
        count: results.len(),
        results,
    })
}

/// POST /readings - Record one sensor reading.
///
/// # Request Body
///
/// ```json
/// {
///     "node_id": 7,
///     "city": "Dar es Salaam",
///     "value_type": "P2",
///     "value": 5.5,
///     "timestamp": "2024-06-15T08:00:00Z"
/// }
/// ```
///
/// Timestamp is optional and defaults to server time.
///
/// # Response
///
/// Returns `202 Accepted` on success.
#[instrument(skip(state, request), fields(city = %request.city, node_id = request.node_id))]
pub async fn post_reading(
    State(state): State<AppState>,
    Json(request): Json<ReadingRequest>,
) -> impl IntoResponse {
    let reading = Reading {
        node_id: request.node_id,
        city: request.city,
        value_type: request.value_type,
        value: request.value,
        timestamp: request.timestamp.unwrap_or_else(Utc::now),
    };

    match state.storage.insert_reading(&reading).await {
        Ok(()) => {
            info!(
                city = %reading.city,
                value_type = %reading.value_type,
                "Reading recorded"
            );
            StatusCode::ACCEPTED
        }
        Err(e) => {
            warn!(
                city = %reading.city,
                error = %e,
                "Failed to record reading"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
