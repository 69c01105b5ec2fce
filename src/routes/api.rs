// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-only API routes consumed by the dashboard.

use crate::error::{AppError, Result};
use crate::models::{AqiCategory, City, CycleReport, Pollutants, Reading};
use crate::services::cpcb::{self, Concentrations, CpcbAqi};
use crate::services::scheduler::CycleState;
use crate::time_utils::{format_utc_rfc3339, parse_rfc3339_utc};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Window used when a range request omits `from`.
const DEFAULT_RANGE_HOURS: i64 = 24;
/// Widest window a single range request may ask for.
const MAX_RANGE_DAYS: i64 = 366;

/// API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/cities", get(get_cities))
        .route("/api/readings/latest", get(get_latest_all))
        .route("/api/readings/{city}/latest", get(get_latest))
        .route("/api/readings/{city}", get(get_range))
        .route("/api/status", get(get_status))
        .route("/api/aqi/calculate", post(calculate_cpcb))
}

// ─── Response Types ──────────────────────────────────────────

/// A stored reading as shown to the dashboard.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadingResponse {
    pub timestamp: String,
    pub aqi_value: f64,
    pub category: AqiCategory,
    pub station: Option<String>,
    pub dominant_pollutant: Option<String>,
    pub pollutants: Pollutants,
    pub fetched_at: String,
}

impl From<Reading> for ReadingResponse {
    fn from(reading: Reading) -> Self {
        Self {
            timestamp: format_utc_rfc3339(reading.timestamp),
            aqi_value: reading.aqi_value,
            category: reading.category(),
            station: reading.station,
            dominant_pollutant: reading.dominant_pollutant,
            pollutants: reading.pollutants,
            fetched_at: format_utc_rfc3339(reading.fetched_at),
        }
    }
}

/// Latest reading for one city; `reading` is null until the first success.
#[derive(Debug, Serialize, Deserialize)]
pub struct CityLatestResponse {
    pub city: City,
    pub reading: Option<ReadingResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CitiesResponse {
    pub cities: Vec<City>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RangeResponse {
    pub city: City,
    pub from: String,
    pub to: String,
    pub readings: Vec<ReadingResponse>,
    pub duplicate_timestamps: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: CycleState,
    pub last_cycle: Option<CycleReport>,
}

// ─── Handlers ────────────────────────────────────────────────

async fn get_cities(State(state): State<Arc<AppState>>) -> Json<CitiesResponse> {
    Json(CitiesResponse {
        cities: state.query.cities().to_vec(),
    })
}

/// Current status of every configured city.
async fn get_latest_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CityLatestResponse>>> {
    let latest = state.query.latest_all().await?;

    // Configuration order, not alphabetical
    let body = state
        .query
        .cities()
        .iter()
        .map(|city| CityLatestResponse {
            city: city.clone(),
            reading: latest
                .get(city)
                .cloned()
                .flatten()
                .map(ReadingResponse::from),
        })
        .collect();

    Ok(Json(body))
}

async fn get_latest(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
) -> Result<Json<CityLatestResponse>> {
    let reading = state.query.latest(&city).await?;
    Ok(Json(CityLatestResponse {
        city: City::new(city),
        reading: reading.map(ReadingResponse::from),
    }))
}

#[derive(Deserialize)]
struct RangeQuery {
    /// Window start (RFC3339), defaults to 24 hours before `to`
    from: Option<String>,
    /// Window end (RFC3339), defaults to now
    to: Option<String>,
}

fn parse_param(name: &str, raw: Option<&str>) -> Result<Option<chrono::DateTime<Utc>>> {
    raw.map(|raw| {
        parse_rfc3339_utc(raw).ok_or_else(|| {
            AppError::BadRequest(format!("Invalid '{}' parameter: must be RFC3339 datetime", name))
        })
    })
    .transpose()
}

async fn get_range(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<RangeResponse>> {
    let to = parse_param("to", params.to.as_deref())?.unwrap_or_else(Utc::now);
    let from = parse_param("from", params.from.as_deref())?
        .unwrap_or_else(|| to - Duration::hours(DEFAULT_RANGE_HOURS));

    if to - from > Duration::days(MAX_RANGE_DAYS) {
        return Err(AppError::BadRequest(format!(
            "Range too wide: at most {} days",
            MAX_RANGE_DAYS
        )));
    }

    let result = state.query.range(&city, from, to).await?;
    if result.duplicate_timestamps > 0 {
        tracing::debug!(
            city = %city,
            duplicates = result.duplicate_timestamps,
            "Range contains duplicate timestamps"
        );
    }

    Ok(Json(RangeResponse {
        city: City::new(city),
        from: format_utc_rfc3339(from),
        to: format_utc_rfc3339(to),
        readings: result
            .readings
            .into_iter()
            .map(ReadingResponse::from)
            .collect(),
        duplicate_timestamps: result.duplicate_timestamps,
    }))
}

/// Last completed cycle and whether one is running now.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        state: state.monitor.state(),
        last_cycle: state.monitor.last_report().await,
    })
}

/// CPCB AQI from raw concentrations. Nothing is stored.
async fn calculate_cpcb(Json(values): Json<Concentrations>) -> Result<Json<CpcbAqi>> {
    cpcb::compute(&values)
        .map(Json)
        .map_err(|e| AppError::BadRequest(e.to_string()))
}
