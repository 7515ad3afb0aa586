//! SQLite storage layer: the concrete reading store behind the
//! [`ReadingStore`] seam.
//!
//! The schema is one append-only table of readings with a composite
//! `(city, value_type, ts)` index, so every engine query is a single
//! range scan. Timestamps are stored as Unix seconds.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::time::timeout;

use crate::aggregation::ReadingStore;
use crate::error::DataSourceError;
use crate::model::{Reading, TimeWindow, ValueType};

/// How long a single store query may run before it is surfaced as a
/// [`DataSourceError::Timeout`].
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:sensorstats.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Override the per-query timeout.
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                node_id INTEGER NOT NULL,
                city TEXT NOT NULL,
                value_type TEXT NOT NULL,
                value REAL NOT NULL,
                ts INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Index for the engine's range scans by city and channel
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_readings_city_type_ts
            ON readings(city, value_type, ts)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a new reading into storage.
    pub async fn insert_reading(&self, reading: &Reading) -> Result<(), DataSourceError> {
        sqlx::query(
            r#"
            INSERT INTO readings (node_id, city, value_type, value, ts)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(reading.node_id)
        .bind(&reading.city)
        .bind(reading.value_type.as_str())
        .bind(reading.value)
        .bind(reading.timestamp.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All cities that have ever reported, alphabetically.
    ///
    /// Used to expand an unfiltered query into a concrete city list; the
    /// ordering here keeps the response independent of storage iteration
    /// order.
    pub async fn list_cities(&self) -> Result<Vec<String>, DataSourceError> {
        let query = sqlx::query(
            r#"
            SELECT DISTINCT city FROM readings ORDER BY city
            "#,
        )
        .fetch_all(&self.pool);

        let rows = timeout(self.query_timeout, query)
            .await
            .map_err(|_| DataSourceError::Timeout(self.query_timeout))??;

        Ok(rows.iter().map(|r| r.get("city")).collect())
    }
}

impl ReadingStore for Storage {
    /// Fetch readings for one city and value type within the half-open
    /// window, ascending by timestamp.
    ///
    /// The query runs under the configured timeout; an elapsed timeout is
    /// reported as a data-source failure, never retried here.
    async fn fetch_readings(
        &self,
        city: &str,
        node_id: Option<i64>,
        value_type: ValueType,
        window: TimeWindow,
    ) -> Result<Vec<Reading>, DataSourceError> {
        let start_ts = window.start.timestamp();
        let end_ts = window.end.timestamp();

        let query = match node_id {
            Some(node_id) => sqlx::query(
                r#"
                SELECT node_id, value, ts
                FROM readings
                WHERE city = ? AND value_type = ? AND node_id = ? AND ts >= ? AND ts < ?
                ORDER BY ts ASC
                "#,
            )
            .bind(city)
            .bind(value_type.as_str())
            .bind(node_id)
            .bind(start_ts)
            .bind(end_ts),
            None => sqlx::query(
                r#"
                SELECT node_id, value, ts
                FROM readings
                WHERE city = ? AND value_type = ? AND ts >= ? AND ts < ?
                ORDER BY ts ASC
                "#,
            )
            .bind(city)
            .bind(value_type.as_str())
            .bind(start_ts)
            .bind(end_ts),
        };

        let rows = timeout(self.query_timeout, query.fetch_all(&self.pool))
            .await
            .map_err(|_| DataSourceError::Timeout(self.query_timeout))??;

        Ok(rows
            .iter()
            .map(|row| {
                let ts: i64 = row.get("ts");
                Reading {
                    node_id: row.get("node_id"),
                    city: city.to_string(),
                    value_type,
                    value: row.get("value"),
                    timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};

    async fn setup_test_storage() -> Storage {
        Storage::new("sqlite::memory:").await.unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn reading(node_id: i64, city: &str, value: f64, timestamp: DateTime<Utc>) -> Reading {
        Reading {
            node_id,
            city: city.to_string(),
            value_type: ValueType::P2,
            value,
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_ordered() {
        let storage = setup_test_storage().await;

        storage
            .insert_reading(&reading(1, "Dar es Salaam", 6.0, utc(2024, 6, 15, 9, 0, 0)))
            .await
            .unwrap();
        storage
            .insert_reading(&reading(1, "Dar es Salaam", 4.0, utc(2024, 6, 15, 8, 0, 0)))
            .await
            .unwrap();

        let window = TimeWindow::new(utc(2024, 6, 15, 0, 0, 0), utc(2024, 6, 16, 0, 0, 0));
        let readings = storage
            .fetch_readings("Dar es Salaam", None, ValueType::P2, window)
            .await
            .unwrap();

        assert_eq!(readings.len(), 2);
        // Ascending by timestamp regardless of insertion order.
        assert_eq!(readings[0].value, 4.0);
        assert_eq!(readings[1].value, 6.0);
        assert_eq!(readings[0].city, "Dar es Salaam");
        assert_eq!(readings[0].value_type, ValueType::P2);
    }

    #[tokio::test]
    async fn test_fetch_window_is_half_open() {
        let storage = setup_test_storage().await;
        let end = utc(2024, 6, 15, 9, 0, 0);

        storage
            .insert_reading(&reading(1, "Dar es Salaam", 1.0, utc(2024, 6, 15, 8, 0, 0)))
            .await
            .unwrap();
        // Exactly on the window end: must be excluded.
        storage
            .insert_reading(&reading(1, "Dar es Salaam", 9.0, end))
            .await
            .unwrap();

        let window = TimeWindow::new(utc(2024, 6, 15, 8, 0, 0), end);
        let readings = storage
            .fetch_readings("Dar es Salaam", None, ValueType::P2, window)
            .await
            .unwrap();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, 1.0);
    }

    #[tokio::test]
    async fn test_fetch_filters_city_and_value_type() {
        let storage = setup_test_storage().await;
        let at = utc(2024, 6, 15, 8, 0, 0);

        storage
            .insert_reading(&reading(1, "Dar es Salaam", 1.0, at))
            .await
            .unwrap();
        storage
            .insert_reading(&reading(2, "Nairobi", 2.0, at))
            .await
            .unwrap();
        storage
            .insert_reading(&Reading {
                value_type: ValueType::Temperature,
                ..reading(1, "Dar es Salaam", 30.0, at)
            })
            .await
            .unwrap();

        let window = TimeWindow::new(utc(2024, 6, 15, 0, 0, 0), utc(2024, 6, 16, 0, 0, 0));
        let readings = storage
            .fetch_readings("Dar es Salaam", None, ValueType::P2, window)
            .await
            .unwrap();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, 1.0);
    }

    #[tokio::test]
    async fn test_fetch_restricts_to_node() {
        let storage = setup_test_storage().await;
        let at = utc(2024, 6, 15, 8, 0, 0);

        storage
            .insert_reading(&reading(1, "Dar es Salaam", 1.0, at))
            .await
            .unwrap();
        storage
            .insert_reading(&reading(2, "Dar es Salaam", 2.0, at))
            .await
            .unwrap();

        let window = TimeWindow::new(utc(2024, 6, 15, 0, 0, 0), utc(2024, 6, 16, 0, 0, 0));
        let readings = storage
            .fetch_readings("Dar es Salaam", Some(2), ValueType::P2, window)
            .await
            .unwrap();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].node_id, 2);
    }

    #[tokio::test]
    async fn test_list_cities_distinct_and_sorted() {
        let storage = setup_test_storage().await;
        let at = utc(2024, 6, 15, 8, 0, 0);

        for city in ["Nairobi", "Bagamoyo", "Nairobi", "Dar es Salaam"] {
            storage
                .insert_reading(&reading(1, city, 1.0, at))
                .await
                .unwrap();
        }

        let cities = storage.list_cities().await.unwrap();

        assert_eq!(cities, vec!["Bagamoyo", "Dar es Salaam", "Nairobi"]);
    }
}
