// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Append-only reading store backed by SQLite.
//!
//! One `readings` table holds every stored observation. Rows are only ever
//! inserted; nothing in this module updates or deletes them. Queries go
//! through the `(city, timestamp_ns, id)` index, so `latest` and `range`
//! never scan a city's whole history.
//!
//! Timestamps are stored as nanoseconds since the Unix epoch. Ties on
//! timestamp are broken by `id`, which is insertion order.
//!
//! The raw provider payload is written to disk but never read back by the
//! query methods, so it never sits in memory beyond a single insert.
//!
//! rusqlite is blocking: each operation takes the connection mutex inside
//! `spawn_blocking`. Holding one mutex per statement group also means a
//! reader sees the table either before or after a whole insert.

use crate::models::{City, FetchStatus, Pollutants, Reading};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        city TEXT NOT NULL,
        timestamp_ns INTEGER NOT NULL,
        fetched_at_ns INTEGER NOT NULL,
        aqi_value REAL NOT NULL,
        station TEXT,
        dominant_pollutant TEXT,
        pm25 REAL,
        pm10 REAL,
        co REAL,
        no2 REAL,
        o3 REAL,
        so2 REAL,
        raw_payload TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_readings_city_timestamp
        ON readings (city, timestamp_ns, id);
";

/// Columns returned by queries; `raw_payload` is not among them.
const READING_COLUMNS: &str = "city, timestamp_ns, fetched_at_ns, aqi_value, station, \
     dominant_pollutant, pm25, pm10, co, no2, o3, so2";

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("City is not configured: {0}")]
    UnknownCity(City),

    #[error("Refusing to store reading with status {0:?}")]
    NotOk(FetchStatus),

    #[error("Timestamp {0} cannot be stored")]
    TimestampOutOfRange(DateTime<Utc>),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Store connection lock poisoned")]
    Poisoned,
}

/// Append-only, time-indexed reading store.
pub struct ReadingStore {
    cities: Vec<City>,
    path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl ReadingStore {
    /// Create a store backed by a private in-memory database (tests, benchmarks).
    pub fn in_memory(cities: Vec<City>) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            cities,
            path: None,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open (or create) the database at `path`.
    pub async fn open(path: impl AsRef<Path>, cities: Vec<City>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db_path = path.clone();
        let (conn, rows) = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn.execute_batch(SCHEMA)?;
            let rows: i64 =
                conn.query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
            Ok::<_, StoreError>((conn, rows))
        })
        .await??;

        tracing::info!(path = %path.display(), rows, "Reading store opened");

        Ok(Self {
            cities,
            path: Some(path),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Configured cities, in configuration order.
    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_configured(&self, city: &City) -> bool {
        self.cities.contains(city)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&conn)
        })
        .await?
    }

    /// Append a validated reading. Duplicate timestamps are accepted.
    pub async fn append(&self, reading: Reading) -> Result<(), StoreError> {
        if !self.is_configured(&reading.city) {
            return Err(StoreError::UnknownCity(reading.city));
        }
        if reading.fetch_status != FetchStatus::Ok {
            return Err(StoreError::NotOk(reading.fetch_status));
        }

        let timestamp_ns = to_nanos(reading.timestamp)?;
        let fetched_at_ns = to_nanos(reading.fetched_at)?;
        let raw_payload = reading
            .raw_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.with_conn(move |conn| {
            let p = &reading.pollutants;
            conn.prepare_cached(
                "INSERT INTO readings (city, timestamp_ns, fetched_at_ns, aqi_value, station,
                     dominant_pollutant, pm25, pm10, co, no2, o3, so2, raw_payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?
            .execute(params![
                reading.city.as_str(),
                timestamp_ns,
                fetched_at_ns,
                reading.aqi_value,
                reading.station,
                reading.dominant_pollutant,
                p.pm25,
                p.pm10,
                p.co,
                p.no2,
                p.o3,
                p.so2,
                raw_payload,
            ])?;
            Ok(())
        })
        .await
    }

    /// Most recent reading for `city`, or `None` if it has no history.
    pub async fn latest(&self, city: &City) -> Result<Option<Reading>, StoreError> {
        if !self.is_configured(city) {
            return Ok(None);
        }
        let city = city.clone();
        self.with_conn(move |conn| latest_row(conn, &city)).await
    }

    /// Readings with `t0 <= timestamp <= t1`, ascending.
    pub async fn range(
        &self,
        city: &City,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError> {
        if t0 > t1 || !self.is_configured(city) {
            return Ok(Vec::new());
        }
        let city = city.clone();
        let (from, to) = (clamp_nanos(t0), clamp_nanos(t1));

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {READING_COLUMNS} FROM readings
                 WHERE city = ?1 AND timestamp_ns BETWEEN ?2 AND ?3
                 ORDER BY timestamp_ns, id"
            ))?;
            let readings = stmt
                .query_map(params![city.as_str(), from, to], read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(readings)
        })
        .await
    }

    /// Latest reading for every configured city, from one snapshot.
    pub async fn latest_all(&self) -> Result<BTreeMap<City, Option<Reading>>, StoreError> {
        let cities = self.cities.clone();
        self.with_conn(move |conn| {
            cities
                .into_iter()
                .map(|city| {
                    let latest = latest_row(conn, &city)?;
                    Ok::<_, StoreError>((city, latest))
                })
                .collect()
        })
        .await
    }

    /// Number of stored readings for `city`.
    pub async fn count(&self, city: &City) -> Result<usize, StoreError> {
        if !self.is_configured(city) {
            return Ok(0);
        }
        let city = city.clone();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM readings WHERE city = ?1",
                params![city.as_str()],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
    }
}

fn latest_row(conn: &Connection, city: &City) -> Result<Option<Reading>, StoreError> {
    let reading = conn
        .prepare_cached(&format!(
            "SELECT {READING_COLUMNS} FROM readings
             WHERE city = ?1
             ORDER BY timestamp_ns DESC, id DESC
             LIMIT 1"
        ))?
        .query_row(params![city.as_str()], read_row)
        .optional()?;
    Ok(reading)
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<Reading> {
    Ok(Reading {
        city: City::new(row.get::<_, String>(0)?),
        timestamp: DateTime::from_timestamp_nanos(row.get(1)?),
        fetched_at: DateTime::from_timestamp_nanos(row.get(2)?),
        aqi_value: row.get(3)?,
        station: row.get(4)?,
        dominant_pollutant: row.get(5)?,
        pollutants: Pollutants {
            pm25: row.get(6)?,
            pm10: row.get(7)?,
            co: row.get(8)?,
            no2: row.get(9)?,
            o3: row.get(10)?,
            so2: row.get(11)?,
        },
        raw_payload: None,
        fetch_status: FetchStatus::Ok,
    })
}

fn to_nanos(t: DateTime<Utc>) -> Result<i64, StoreError> {
    t.timestamp_nanos_opt().ok_or(StoreError::TimestampOutOfRange(t))
}

/// Query bounds outside the storable range clamp to its ends.
fn clamp_nanos(t: DateTime<Utc>) -> i64 {
    t.timestamp_nanos_opt()
        .unwrap_or(if t.timestamp() < 0 { i64::MIN } else { i64::MAX })
}
