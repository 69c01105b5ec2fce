// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AQI reading model for storage and API.

use super::City;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest AQI value accepted from the provider.
pub const MAX_AQI: f64 = 1000.0;

/// Per-reading fetch status.
///
/// Stored readings are always `Ok`; the other variants only appear in
/// cycle outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchStatus {
    Ok,
    ProviderError,
    InvalidData,
    StoreError,
}

/// Individual pollutant sub-indices reported alongside the overall AQI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pollutants {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm25: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm10: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o3: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub so2: Option<f64>,
}

/// One stored AQI observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Configured city this reading belongs to
    pub city: City,
    /// Observation time reported by the provider (or fetch time if absent)
    pub timestamp: DateTime<Utc>,
    /// Overall AQI index
    pub aqi_value: f64,
    /// When the payload was received
    pub fetched_at: DateTime<Utc>,
    /// Provider station name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    /// Pollutant driving the overall index (e.g. "pm25")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_pollutant: Option<String>,
    #[serde(default)]
    pub pollutants: Pollutants,
    /// Unmodified provider response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<serde_json::Value>,
    pub fetch_status: FetchStatus,
}

impl Reading {
    /// US EPA category for this reading's AQI.
    pub fn category(&self) -> AqiCategory {
        AqiCategory::from_aqi(self.aqi_value)
    }
}

/// US EPA AQI categories (the scale WAQI reports in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitiveGroups,
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub fn from_aqi(aqi: f64) -> Self {
        match aqi {
            a if a <= 50.0 => Self::Good,
            a if a <= 100.0 => Self::Moderate,
            a if a <= 150.0 => Self::UnhealthyForSensitiveGroups,
            a if a <= 200.0 => Self::Unhealthy,
            a if a <= 300.0 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }
}
