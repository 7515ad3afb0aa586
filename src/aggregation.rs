//! Aggregation orchestration: composing the store query, the per-node
//! reduce, the city combine, and the time bucketer into one response.
//!
//! The orchestrator is read-only and holds no state between requests. Every
//! aggregate it produces is constructed fresh and returned, so concurrent
//! requests never share mutable data.

use std::collections::BTreeMap;

use crate::bucket::bucketize;
use crate::error::DataSourceError;
use crate::model::{CityResult, CityStat, Granularity, Reading, TimeWindow, ValueStats, ValueType};
use crate::stats::{combine_city, reduce_node};
use crate::validate::QueryPlan;

/// The one interface the engine consumes from its collaborating store.
///
/// Implementations must return readings sorted ascending by timestamp and
/// honor the half-open `[start, end)` window exactly; the engine does not
/// re-check either.
#[allow(async_fn_in_trait)]
pub trait ReadingStore {
    /// Readings for one city and value type within `window`, optionally
    /// restricted to a single node.
    async fn fetch_readings(
        &self,
        city: &str,
        node_id: Option<i64>,
        value_type: ValueType,
        window: TimeWindow,
    ) -> Result<Vec<Reading>, DataSourceError>;
}

/// Run the full aggregation pipeline for a validated plan.
///
/// For each requested city and value type the store is queried once for the
/// whole window; readings are grouped by node in memory, reduced per node,
/// and combined into city stats, restricted per bucket when a granularity
/// is set. Nothing is re-fetched per bucket.
///
/// Empty combinations are omitted rather than zero-filled: a value type
/// with no contributing readings does not appear under its city, an empty
/// bucket does not appear in a series, and a city with no surviving value
/// types does not appear at all.
///
/// Cities come back in alphabetical order regardless of how they were
/// requested; series come back newest bucket first.
pub async fn aggregate<S: ReadingStore>(
    store: &S,
    plan: &QueryPlan,
) -> Result<Vec<CityResult>, DataSourceError> {
    let mut cities: Vec<&str> = plan.cities.iter().map(String::as_str).collect();
    cities.sort_unstable();
    cities.dedup();

    let mut results = Vec::with_capacity(cities.len());
    for city in cities {
        let mut stats = BTreeMap::new();
        for &value_type in &plan.value_types {
            let readings = store
                .fetch_readings(city, None, value_type, plan.window)
                .await?;
            if readings.is_empty() {
                continue;
            }
            let by_node = group_by_node(readings);

            match plan.granularity {
                Granularity::None => {
                    let stat =
                        combine_city(by_node.values().map(|rs| reduce_node(rs, value_type)));
                    if stat.sample_count > 0 {
                        stats.insert(value_type, ValueStats::Snapshot(stat));
                    }
                }
                granularity => {
                    let series = bucket_series(&by_node, value_type, plan.window, granularity);
                    if !series.is_empty() {
                        stats.insert(value_type, ValueStats::Series(series));
                    }
                }
            }
        }
        if !stats.is_empty() {
            results.push(CityResult {
                city_name: city.to_string(),
                stats,
            });
        }
    }

    Ok(results)
}

/// Reduce and combine per bucket, newest first, dropping empty buckets.
fn bucket_series(
    by_node: &BTreeMap<i64, Vec<Reading>>,
    value_type: ValueType,
    window: TimeWindow,
    granularity: Granularity,
) -> Vec<CityStat> {
    let mut series = Vec::new();
    for bucket in bucketize(window, granularity) {
        let stat = combine_city(by_node.values().map(|rs| {
            reduce_node(
                rs.iter().filter(|r| bucket.contains(r.timestamp)),
                value_type,
            )
        }));
        if stat.sample_count > 0 {
            series.push(CityStat {
                window: Some(bucket),
                ..stat
            });
        }
    }
    series
}

fn group_by_node(readings: Vec<Reading>) -> BTreeMap<i64, Vec<Reading>> {
    let mut by_node: BTreeMap<i64, Vec<Reading>> = BTreeMap::new();
    for reading in readings {
        by_node.entry(reading.node_id).or_default().push(reading);
    }
    by_node
}
