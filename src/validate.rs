//! Query validation: raw string parameters in, a normalized [`QueryPlan`]
//! out.
//!
//! Validation is pure. The current time is always injected by the caller,
//! never read from ambient process state, so the same parameters and clock
//! always produce the same plan.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::ValidationError;
use crate::model::{AirQuery, Granularity, TimeWindow, ValueType};

/// Date format accepted for `from` and `to`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const DATE_FORMAT_MESSAGE: &str = "Must be a date in the format Y-m-d.";
const FROM_REQUIRED_MESSAGE: &str = "Must be provide along with to query";
const RANGE_ORDER_MESSAGE: &str = "Must not be a date before the from date.";

/// A validated, normalized query ready for orchestration.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Requested cities. Empty means every known city.
    pub cities: Vec<String>,

    /// Value types to aggregate.
    pub value_types: Vec<ValueType>,

    /// The overall query range.
    pub window: TimeWindow,

    /// How the range is bucketed. `None` means a snapshot.
    pub granularity: Granularity,
}

/// Check parameter consistency and build the plan.
///
/// Date handling:
/// - `from` and `to` must be `Y-m-d` calendar dates. `from` normalizes to
///   the start of its day, `to` to the start of the following day, so
///   `from == to` covers that whole day.
/// - `to` without `from` is rejected.
/// - `from` without `to` means "from that day up to `now`".
/// - No dates at all means a snapshot of the trailing `lookback` ending at
///   `now`, with granularity forced to `None`.
///
/// An unrecognized `avg` value falls back to `None` rather than erroring;
/// a ranged query with no `avg` defaults to day buckets.
pub fn validate(
    query: &AirQuery,
    now: DateTime<Utc>,
    lookback: Duration,
) -> Result<QueryPlan, ValidationError> {
    let window;
    let ranged;
    match (query.from.as_deref(), query.to.as_deref()) {
        (None, Some(_)) => {
            return Err(ValidationError::new("from", FROM_REQUIRED_MESSAGE));
        }
        (Some(from), to) => {
            let start = parse_date("from", from)?
                .and_time(NaiveTime::MIN)
                .and_utc();
            let end = match to {
                Some(to) => {
                    let end = (parse_date("to", to)? + Days::new(1))
                        .and_time(NaiveTime::MIN)
                        .and_utc();
                    if end < start {
                        return Err(ValidationError::new("to", RANGE_ORDER_MESSAGE));
                    }
                    end
                }
                None => now,
            };
            window = TimeWindow::new(start, end);
            ranged = true;
        }
        (None, None) => {
            window = TimeWindow::new(now - lookback, now);
            ranged = false;
        }
    }

    // Without a range there is nothing to bucket; the query is a snapshot
    // regardless of `avg`.
    let granularity = if !ranged {
        Granularity::None
    } else {
        match query.avg.as_deref() {
            Some(avg) => Granularity::parse(avg).unwrap_or(Granularity::None),
            None => Granularity::Day,
        }
    };

    Ok(QueryPlan {
        cities: parse_cities(query.city.as_deref()),
        value_types: parse_value_types(query.value_type.as_deref())?,
        window,
        granularity,
    })
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| ValidationError::new(field, DATE_FORMAT_MESSAGE))
}

fn parse_cities(value: Option<&str>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|city| !city.is_empty())
        .map(String::from)
        .collect()
}

fn parse_value_types(value: Option<&str>) -> Result<Vec<ValueType>, ValidationError> {
    let Some(value) = value else {
        return Ok(ValueType::ALL.to_vec());
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            ValueType::parse(name).ok_or_else(|| {
                let supported = ValueType::ALL.map(|v| v.as_str()).join(", ");
                ValidationError::new("value_type", format!("Must be one of {supported}."))
            })
        })
        .collect()
}
