//! Time bucketing: partitioning a query range into ordered, calendar-aligned
//! spans.
//!
//! Buckets are contiguous, non-overlapping, and together cover the whole
//! query range. Boundary buckets keep their full calendar span rather than
//! being clipped to the range; assignment of readings is still limited to
//! the range itself, so an unclipped edge bucket never picks up readings
//! outside the query. The series is returned newest-first, matching the
//! "most recent value first" shape consumers expect.

use chrono::{DateTime, Days, Months, NaiveTime, TimeZone, Utc};

use crate::model::{Granularity, TimeWindow};

/// Divide `window` into buckets of the requested granularity, in descending
/// start-time order.
///
/// `Granularity::None` yields a single bucket equal to the window. For the
/// calendar granularities, the first bucket starts at the unit boundary at
/// or before `window.start` and the last ends at the unit boundary at or
/// after `window.end`.
///
/// A zero-width window (`start == end`) is treated as spanning from that
/// instant to the end of its calendar day.
pub fn bucketize(window: TimeWindow, granularity: Granularity) -> Vec<TimeWindow> {
    let end = if window.is_empty() {
        start_of_next_day(window.start)
    } else {
        window.end
    };

    if granularity == Granularity::None {
        return vec![TimeWindow::new(window.start, end)];
    }

    let mut cursor = floor_to(granularity, window.start);
    let mut buckets = Vec::new();
    while cursor < end {
        let next = advance(granularity, cursor);
        buckets.push(TimeWindow::new(cursor, next));
        cursor = next;
    }

    buckets.reverse();
    buckets
}

/// Align `t` down to the enclosing unit boundary. `None` performs no
/// alignment.
fn floor_to(granularity: Granularity, t: DateTime<Utc>) -> DateTime<Utc> {
    match granularity {
        Granularity::None => t,
        Granularity::Minute => truncate_seconds(t, 60),
        Granularity::Hour => truncate_seconds(t, 3_600),
        Granularity::Day => truncate_seconds(t, 86_400),
        Granularity::Month => first_of_month(t),
    }
}

/// Step an aligned boundary forward by one unit. `None` does not step.
fn advance(granularity: Granularity, t: DateTime<Utc>) -> DateTime<Utc> {
    match granularity {
        Granularity::None => t,
        Granularity::Minute => t + chrono::Duration::minutes(1),
        Granularity::Hour => t + chrono::Duration::hours(1),
        Granularity::Day => t + chrono::Duration::days(1),
        Granularity::Month => (t.date_naive() + Months::new(1))
            .and_time(NaiveTime::MIN)
            .and_utc(),
    }
}

fn truncate_seconds(t: DateTime<Utc>, unit: i64) -> DateTime<Utc> {
    let secs = t.timestamp();
    Utc.timestamp_opt(secs - secs.rem_euclid(unit), 0).unwrap()
}

fn first_of_month(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive()
        .with_day(1)
        .unwrap()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

fn start_of_next_day(t: DateTime<Utc>) -> DateTime<Utc> {
    (t.date_naive() + Days::new(1))
        .and_time(NaiveTime::MIN)
        .and_utc()
}
