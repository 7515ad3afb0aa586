//! Error taxonomy for the aggregation engine.
//!
//! Malformed queries are rejected at the boundary with a field-keyed
//! [`ValidationError`] and never reach the aggregation pipeline. Failures of
//! the underlying reading store surface as [`DataSourceError`] and propagate
//! unchanged so the caller can apply its own retry policy; the engine never
//! retries. An empty result is not an error anywhere in the engine.

use std::time::Duration;

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

/// A rejected query parameter, tagged with the field that caused it.
///
/// Serializes directly to the response body shape, a one-entry map from
/// field name to message:
///
/// ```json
/// {"from": "Must be a date in the format Y-m-d."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// The query parameter at fault.
    pub field: &'static str,

    /// What a correct value looks like.
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Serialize for ValidationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.field, &self.message)?;
        map.end()
    }
}

/// A failure of the reading store.
///
/// Not recoverable inside the engine; retry and backoff belong to the
/// caller.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("reading store query failed")]
    Backend(#[from] sqlx::Error),

    #[error("reading store query timed out after {0:?}")]
    Timeout(Duration),
}

/// Union of everything the query entry point can fail with.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    DataSource(#[from] DataSourceError),
}
