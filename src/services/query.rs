// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-only query façade over the reading store.
//!
//! Never fetches and never caches: staleness is bounded by the scheduler's
//! cadence alone.

use crate::db::{ReadingStore, StoreError};
use crate::models::{City, Reading};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Query errors. An empty history is not an error.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("City is not configured: {0}")]
    UnknownCity(String),

    #[error("Invalid range: from {from} is after to {to}")]
    InvalidRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Readings in a window plus a data-quality signal.
#[derive(Debug, Clone)]
pub struct RangeResult {
    pub readings: Vec<Reading>,
    /// Readings sharing a timestamp with their predecessor
    pub duplicate_timestamps: usize,
}

#[derive(Clone)]
pub struct QueryService {
    store: Arc<ReadingStore>,
}

impl QueryService {
    pub fn new(store: Arc<ReadingStore>) -> Self {
        Self { store }
    }

    pub fn cities(&self) -> &[City] {
        self.store.cities()
    }

    /// Resolve a caller-supplied name against the configured set.
    pub fn resolve(&self, name: &str) -> Result<City, QueryError> {
        self.store
            .cities()
            .iter()
            .find(|c| c.as_str() == name)
            .cloned()
            .ok_or_else(|| QueryError::UnknownCity(name.to_string()))
    }

    /// Latest reading; `Ok(None)` when the city has never been fetched.
    pub async fn latest(&self, city: &str) -> Result<Option<Reading>, QueryError> {
        let city = self.resolve(city)?;
        Ok(self.store.latest(&city).await?)
    }

    pub async fn range(
        &self,
        city: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<RangeResult, QueryError> {
        let city = self.resolve(city)?;
        if from > to {
            return Err(QueryError::InvalidRange { from, to });
        }
        let readings = self.store.range(&city, from, to).await?;
        let duplicate_timestamps = count_duplicate_timestamps(&readings);
        Ok(RangeResult {
            readings,
            duplicate_timestamps,
        })
    }

    pub async fn latest_all(&self) -> Result<BTreeMap<City, Option<Reading>>, QueryError> {
        Ok(self.store.latest_all().await?)
    }
}

/// Count readings whose timestamp equals the previous one (input sorted).
pub fn count_duplicate_timestamps(readings: &[Reading]) -> usize {
    readings
        .windows(2)
        .filter(|w| w[0].timestamp == w[1].timestamp)
        .count()
}
