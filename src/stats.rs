//! Two-stage statistic reduction: readings to per-node stats, per-node
//! stats to a city stat.
//!
//! # Weighting
//!
//! Nodes report at different rates, so the city average is the
//! count-weighted mean of the node averages, `sum(avg_i * count_i) /
//! sum(count_i)`. A plain mean of per-node averages would bias toward
//! low-sample nodes. Minimum and maximum fold elementwise and are
//! count-independent.
//!
//! Both stages are pure and deterministic, and the combination is
//! commutative and associative: any grouping or ordering of the same inputs
//! yields the same city stat.

use crate::model::{CityStat, NodeStat, Reading, ValueType};

/// Reduce one node's readings for one value type into a [`NodeStat`].
///
/// Readings for other value types are ignored. With no matching readings
/// the result is [`NodeStat::EMPTY`]; callers must check `sample_count`
/// before trusting the other fields.
pub fn reduce_node<'a, I>(readings: I, value_type: ValueType) -> NodeStat
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut sum = 0.0;
    let mut count = 0u64;
    let mut minimum = f64::INFINITY;
    let mut maximum = f64::NEG_INFINITY;

    for reading in readings {
        if reading.value_type != value_type {
            continue;
        }
        sum += reading.value;
        count += 1;
        minimum = minimum.min(reading.value);
        maximum = maximum.max(reading.value);
    }

    if count == 0 {
        return NodeStat::EMPTY;
    }

    NodeStat {
        average: sum / count as f64,
        minimum,
        maximum,
        sample_count: count,
    }
}

/// Merge per-node stats for the same value type and window into one
/// [`CityStat`].
///
/// Stats with `sample_count == 0` contributed nothing and are dropped
/// before combining; they are never treated as a zero-valued sample. If no
/// stats remain the result has `sample_count == 0`.
///
/// The returned stat carries no window; a caller assembling a bucketed
/// series attaches the bucket span itself.
pub fn combine_city<I>(stats: I) -> CityStat
where
    I: IntoIterator<Item = NodeStat>,
{
    let mut weighted_sum = 0.0;
    let mut count = 0u64;
    let mut minimum = f64::INFINITY;
    let mut maximum = f64::NEG_INFINITY;

    for stat in stats {
        if stat.sample_count == 0 {
            continue;
        }
        weighted_sum += stat.average * stat.sample_count as f64;
        count += stat.sample_count;
        minimum = minimum.min(stat.minimum);
        maximum = maximum.max(stat.maximum);
    }

    if count == 0 {
        return CityStat {
            average: 0.0,
            minimum: 0.0,
            maximum: 0.0,
            sample_count: 0,
            window: None,
        };
    }

    CityStat {
        average: weighted_sum / count as f64,
        minimum,
        maximum,
        sample_count: count,
        window: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(value_type: ValueType, value: f64) -> Reading {
        Reading {
            node_id: 1,
            city: "Dar es Salaam".to_string(),
            value_type,
            value,
            timestamp: Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap(),
        }
    }

    fn node_stat(average: f64, minimum: f64, maximum: f64, sample_count: u64) -> NodeStat {
        NodeStat {
            average,
            minimum,
            maximum,
            sample_count,
        }
    }

    #[test]
    fn test_reduce_node_basic() {
        let readings = vec![
            reading(ValueType::P2, 4.0),
            reading(ValueType::P2, 8.0),
            reading(ValueType::P2, 6.0),
        ];

        let stat = reduce_node(&readings, ValueType::P2);

        assert_eq!(stat.sample_count, 3);
        assert_eq!(stat.average, 6.0);
        assert_eq!(stat.minimum, 4.0);
        assert_eq!(stat.maximum, 8.0);
    }

    #[test]
    fn test_reduce_node_filters_value_type() {
        let readings = vec![
            reading(ValueType::P2, 4.0),
            reading(ValueType::Temperature, 30.0),
            reading(ValueType::P2, 6.0),
        ];

        let stat = reduce_node(&readings, ValueType::P2);

        assert_eq!(stat.sample_count, 2);
        assert_eq!(stat.average, 5.0);
        assert_eq!(stat.maximum, 6.0);
    }

    #[test]
    fn test_reduce_node_empty() {
        let readings = vec![reading(ValueType::Temperature, 30.0)];

        let stat = reduce_node(&readings, ValueType::P2);

        assert_eq!(stat, NodeStat::EMPTY);
    }

    #[test]
    fn test_combine_weighted_average() {
        // One node averages 5.5 over 6 samples, another 0.0 over 6 samples.
        // The city average is (5.5 * 6 + 0.0 * 6) / 12 = 2.75.
        let a = node_stat(5.5, 4.0, 8.0, 6);
        let b = node_stat(0.0, 0.0, 0.0, 6);

        let city = combine_city([a, b]);

        assert_eq!(city.average, 2.75);
        assert_eq!(city.minimum, 0.0);
        assert_eq!(city.maximum, 8.0);
        assert_eq!(city.sample_count, 12);
    }

    #[test]
    fn test_combine_incremental() {
        // Folding a previous city stat back in with a new node preserves
        // the weighting: (2.75 * 12 + 4.0 * 3) / 15 = 3.0.
        let previous = combine_city([node_stat(5.5, 0.0, 8.0, 6), node_stat(0.0, 0.0, 0.0, 6)]);
        assert_eq!(previous.average, 2.75);

        let city = combine_city([NodeStat::from(&previous), node_stat(4.0, 4.0, 4.0, 3)]);

        assert_eq!(city.average, 3.0);
        assert_eq!(city.sample_count, 15);
        assert_eq!(city.minimum, 0.0);
        assert_eq!(city.maximum, 8.0);
    }

    #[test]
    fn test_combine_order_independent() {
        let stats = [
            node_stat(5.5, 4.0, 8.0, 6),
            node_stat(0.0, 0.0, 0.0, 6),
            node_stat(4.0, 4.0, 4.0, 3),
            node_stat(12.5, 10.0, 15.0, 2),
        ];

        let expected = combine_city(stats);

        // Every rotation and the full reversal must agree.
        for shift in 0..stats.len() {
            let mut rotated = stats;
            rotated.rotate_left(shift);
            assert_eq!(combine_city(rotated), expected);
        }
        let mut reversed = stats;
        reversed.reverse();
        assert_eq!(combine_city(reversed), expected);
    }

    #[test]
    fn test_combine_drops_empty_nodes() {
        // An idle node is excluded, not counted as a zero sample.
        let city = combine_city([node_stat(6.0, 4.0, 8.0, 2), NodeStat::EMPTY]);

        assert_eq!(city.average, 6.0);
        assert_eq!(city.sample_count, 2);
        assert_eq!(city.minimum, 4.0);
    }

    #[test]
    fn test_combine_all_empty() {
        let city = combine_city([NodeStat::EMPTY, NodeStat::EMPTY]);

        assert_eq!(city.sample_count, 0);
        assert_eq!(city.average, 0.0);
        assert_eq!(city.minimum, 0.0);
        assert_eq!(city.maximum, 0.0);
    }
}
