//! sensorstats - city-level statistics over environmental sensor readings.
//!
//! # Overview
//!
//! Sensor nodes report timestamped measurements (particulate matter,
//! temperature, humidity, pressure) tagged with a city. The engine answers
//! statistical queries over those readings: average, minimum, and maximum
//! per city and value type, either as one current snapshot or as a
//! time-bucketed series over an explicit date range.
//!
//! Statistics are computed in two stages. Readings reduce to per-node
//! aggregates, and node aggregates combine into a city aggregate with a
//! count-weighted mean, so nodes that report at different rates contribute
//! in proportion to their sample counts. The combination never re-scans
//! raw readings.
//!
//! # Modules
//!
//! - [`model`]: Readings, value types, time windows, and aggregate types
//! - [`stats`]: Per-node reduction and per-city combination
//! - [`bucket`]: Calendar-aligned time bucketing
//! - [`validate`]: Query parameter validation and normalization
//! - [`aggregation`]: The orchestrator and the reading-store seam
//! - [`error`]: Validation and data-source error taxonomy
//! - [`storage`]: SQLite reading store
//! - [`api`]: HTTP API handlers

pub mod aggregation;
pub mod api;
pub mod bucket;
pub mod error;
pub mod model;
pub mod stats;
pub mod storage;
pub mod validate;
