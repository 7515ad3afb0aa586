//! Data models for sensorstats.
//!
//! Everything the engine computes is derived from one immutable fact type,
//! [`Reading`]. Aggregates ([`NodeStat`], [`CityStat`]) are created fresh for
//! each query, never mutated after construction, and discarded with the
//! response. They hold no cross-request state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single timestamped sensor measurement for one value type at one node.
///
/// Readings are produced by ingestion and are read-only to the aggregation
/// engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// The physical sensor device that reported this measurement.
    pub node_id: i64,

    /// The city the reporting node is associated with.
    pub city: String,

    /// The measurement channel this value belongs to.
    pub value_type: ValueType,

    /// The measured value.
    pub value: f64,

    /// When the measurement was taken (UTC).
    pub timestamp: DateTime<Utc>,
}

/// A measurement channel.
///
/// Statistics are never mixed across value types. The enumeration is closed:
/// a reading cannot carry a channel the engine does not know how to
/// aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueType {
    /// Particulate matter up to 10 micrometres (PM10).
    P1,

    /// Particulate matter up to 2.5 micrometres (PM2.5).
    P2,

    /// Air temperature in degrees Celsius.
    #[serde(rename = "temperature")]
    Temperature,

    /// Relative humidity in percent.
    #[serde(rename = "humidity")]
    Humidity,

    /// Atmospheric pressure in hectopascal.
    #[serde(rename = "pressure")]
    Pressure,
}

impl ValueType {
    /// Every channel the engine aggregates, in output order.
    pub const ALL: [ValueType; 5] = [
        ValueType::P1,
        ValueType::P2,
        ValueType::Temperature,
        ValueType::Humidity,
        ValueType::Pressure,
    ];

    /// The wire name used in query parameters and response keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::P1 => "P1",
            ValueType::P2 => "P2",
            ValueType::Temperature => "temperature",
            ValueType::Humidity => "humidity",
            ValueType::Pressure => "pressure",
        }
    }

    /// Parse a wire name. Returns `None` for unrecognized channels.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "P1" => Some(ValueType::P1),
            "P2" => Some(ValueType::P2),
            "temperature" => Some(ValueType::Temperature),
            "humidity" => Some(ValueType::Humidity),
            "pressure" => Some(ValueType::Pressure),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A half-open time interval `[start, end)`.
///
/// Used both as the overall query range and as an individual bucket span.
/// Invariant: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    /// Inclusive start of the interval.
    #[serde(rename = "start_datetime")]
    pub start: DateTime<Utc>,

    /// Exclusive end of the interval.
    #[serde(rename = "end_datetime")]
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start <= end, "time window start must not be after end");
        Self { start, end }
    }

    /// Whether `t` falls inside the interval.
    ///
    /// A timestamp exactly on `end` belongs to the next window, never this
    /// one, so adjacent windows never double count.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    /// A zero-width window covers a single instant.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// How a query range is divided into buckets.
///
/// `None` means one window covering the whole range, treated as a snapshot
/// with no sub-buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    None,
    Minute,
    Hour,
    Day,
    Month,
}

impl Granularity {
    /// Parse a wire name. Returns `None` for unrecognized values so callers
    /// can apply their own fallback.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minute" => Some(Granularity::Minute),
            "hour" => Some(Granularity::Hour),
            "day" => Some(Granularity::Day),
            "month" => Some(Granularity::Month),
            _ => None,
        }
    }
}

/// Per-node aggregate for one value type within one window.
///
/// `sample_count == 0` means the node contributed nothing in that window;
/// the remaining fields are reported as zero and must not be trusted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStat {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub sample_count: u64,
}

impl NodeStat {
    /// The stat of a node that reported nothing.
    pub const EMPTY: NodeStat = NodeStat {
        average: 0.0,
        minimum: 0.0,
        maximum: 0.0,
        sample_count: 0,
    };
}

/// Per-city aggregate for one value type within one window.
///
/// Carries its bucket span when produced as one point of a time series,
/// serialized as `start_datetime`/`end_datetime` alongside the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CityStat {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub sample_count: u64,

    /// The bucket this stat covers, when part of a bucketed series.
    #[serde(flatten)]
    pub window: Option<TimeWindow>,
}

impl From<&CityStat> for NodeStat {
    /// A city aggregate can be folded back into a further combination as if
    /// it were one node. The count-weighted mean makes this lossless.
    fn from(stat: &CityStat) -> Self {
        NodeStat {
            average: stat.average,
            minimum: stat.minimum,
            maximum: stat.maximum,
            sample_count: stat.sample_count,
        }
    }
}

/// Raw query parameters for GET /v2/data/air, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AirQuery {
    /// Comma-separated list of cities. Absent means every known city.
    pub city: Option<String>,

    /// Comma-separated list of value type wire names. Absent means all.
    pub value_type: Option<String>,

    /// Range start date, `Y-m-d`.
    pub from: Option<String>,

    /// Range end date, `Y-m-d`. Requires `from`.
    pub to: Option<String>,

    /// Bucket granularity for ranged queries.
    pub avg: Option<String>,
}

/// Request body for POST /readings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadingRequest {
    pub node_id: i64,
    pub city: String,
    pub value_type: ValueType,
    pub value: f64,

    /// Measurement time. Defaults to server time when omitted.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// The statistics reported for one value type of one city: a single
/// snapshot when no granularity was requested, otherwise a series in
/// descending bucket order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValueStats {
    Snapshot(CityStat),
    Series(Vec<CityStat>),
}

/// One entry of the response: a city and the statistics for each value type
/// that had data. Value types with no contributing readings are omitted
/// entirely, so callers can distinguish "no data" from "zero value".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityResult {
    pub city_name: String,

    #[serde(flatten)]
    pub stats: BTreeMap<ValueType, ValueStats>,
}

/// Response envelope for GET /v2/data/air.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirStatsResponse {
    /// Number of cities in `results`.
    pub count: usize,

    /// Per-city statistics, alphabetical by city name.
    pub results: Vec<CityResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_type_round_trip() {
        for value_type in ValueType::ALL {
            assert_eq!(ValueType::parse(value_type.as_str()), Some(value_type));
        }
        assert_eq!(ValueType::parse("radiation"), None);
    }

    #[test]
    fn test_granularity_parse_unrecognized() {
        assert_eq!(Granularity::parse("hour"), Some(Granularity::Hour));
        assert_eq!(Granularity::parse("fortnight"), None);
        assert_eq!(Granularity::parse(""), None);
    }

    #[test]
    fn test_window_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
        let window = TimeWindow::new(start, end);

        assert!(window.contains(start));
        assert!(window.contains(end - chrono::Duration::seconds(1)));
        assert!(!window.contains(end));
        assert!(!window.contains(start - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_city_stat_serializes_window_inline() {
        let start = Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
        let stat = CityStat {
            average: 2.75,
            minimum: 0.0,
            maximum: 8.0,
            sample_count: 12,
            window: Some(TimeWindow::new(start, end)),
        };

        let json = serde_json::to_value(&stat).unwrap();
        assert_eq!(json["average"], 2.75);
        assert_eq!(json["start_datetime"], "2024-06-15T08:00:00Z");
        assert_eq!(json["end_datetime"], "2024-06-15T09:00:00Z");
    }

    #[test]
    fn test_city_stat_snapshot_has_no_window_fields() {
        let stat = CityStat {
            average: 1.0,
            minimum: 1.0,
            maximum: 1.0,
            sample_count: 1,
            window: None,
        };

        let json = serde_json::to_value(&stat).unwrap();
        assert!(json.get("start_datetime").is_none());
        assert!(json.get("end_datetime").is_none());
    }
}
