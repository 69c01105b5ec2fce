// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Convert raw WAQI feed payloads into validated [`Reading`]s.
//!
//! Pure functions only: no I/O, no clock. The fetch time comes in with the
//! payload and is the fallback when the provider omits its own timestamp.

use crate::models::reading::MAX_AQI;
use crate::models::{City, FetchStatus, Pollutants, Reading};
use crate::services::provider::RawPayload;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Why a payload could not become a reading.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Normalizer settings.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    retain_raw_payload: bool,
}

impl Normalizer {
    pub fn new(retain_raw_payload: bool) -> Self {
        Self { retain_raw_payload }
    }

    /// Validate `payload` and build the reading for `city`.
    pub fn normalize(&self, city: &City, payload: &RawPayload) -> Result<Reading, ValidationFailure> {
        let data = payload
            .body
            .get("data")
            .filter(|d| d.is_object())
            .ok_or_else(|| invalid("missing 'data' object"))?;

        let aqi_value = parse_aqi(data.get("aqi"))?;
        let timestamp = parse_timestamp(data.get("time"))?.unwrap_or(payload.fetched_at);

        let station = data
            .get("city")
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let dominant_pollutant = data
            .get("dominentpol")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let iaqi = data.get("iaqi");
        let pollutants = Pollutants {
            pm25: sub_index(iaqi, "pm25"),
            pm10: sub_index(iaqi, "pm10"),
            co: sub_index(iaqi, "co"),
            no2: sub_index(iaqi, "no2"),
            o3: sub_index(iaqi, "o3"),
            so2: sub_index(iaqi, "so2"),
        };

        Ok(Reading {
            city: city.clone(),
            timestamp,
            aqi_value,
            fetched_at: payload.fetched_at,
            station,
            dominant_pollutant,
            pollutants,
            raw_payload: self.retain_raw_payload.then(|| payload.body.clone()),
            fetch_status: FetchStatus::Ok,
        })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

fn invalid(msg: impl Into<String>) -> ValidationFailure {
    ValidationFailure::InvalidData(msg.into())
}

/// WAQI sends the index as a number, a numeric string, or "-" when the
/// station has nothing to report.
fn parse_aqi(value: Option<&Value>) -> Result<f64, ValidationFailure> {
    let aqi = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid(format!("missing or non-numeric aqi: {}", display(value))))?;

    if !aqi.is_finite() || !(0.0..=MAX_AQI).contains(&aqi) {
        return Err(invalid(format!("aqi {} outside 0..={}", aqi, MAX_AQI)));
    }
    Ok(aqi)
}

/// `None` when the provider gave no timestamp at all.
fn parse_timestamp(time: Option<&Value>) -> Result<Option<DateTime<Utc>>, ValidationFailure> {
    let Some(iso) = time.and_then(|t| t.get("iso")).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let raw = iso
        .as_str()
        .ok_or_else(|| invalid(format!("non-string time.iso: {}", iso)))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|e| invalid(format!("unparseable time.iso {:?}: {}", raw, e)))
}

fn sub_index(iaqi: Option<&Value>, key: &str) -> Option<f64> {
    iaqi?
        .get(key)?
        .get("v")?
        .as_f64()
        .filter(|v| v.is_finite())
}

fn display(value: Option<&Value>) -> String {
    value.map_or_else(|| "absent".to_string(), Value::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap()
    }

    fn payload(body: Value) -> RawPayload {
        RawPayload {
            body,
            fetched_at: fetched_at(),
        }
    }

    fn normalize(body: Value) -> Result<Reading, ValidationFailure> {
        Normalizer::default().normalize(&City::from("Delhi"), &payload(body))
    }

    #[test]
    fn test_full_feed() {
        let reading = normalize(json!({
            "status": "ok",
            "data": {
                "aqi": 145,
                "dominentpol": "pm25",
                "city": {"name": "Anand Vihar, Delhi", "geo": [28.6, 77.3]},
                "iaqi": {"pm25": {"v": 145}, "pm10": {"v": 88.5}, "t": {"v": 21}},
                "time": {"s": "2026-03-01 10:00:00", "tz": "+05:30", "iso": "2026-03-01T10:00:00+05:30"},
                "attributions": []
            }
        }))
        .unwrap();

        assert_eq!(reading.aqi_value, 145.0);
        assert_eq!(
            reading.timestamp,
            Utc.with_ymd_and_hms(2026, 3, 1, 4, 30, 0).unwrap()
        );
        assert_eq!(reading.fetched_at, fetched_at());
        assert_eq!(reading.station.as_deref(), Some("Anand Vihar, Delhi"));
        assert_eq!(reading.dominant_pollutant.as_deref(), Some("pm25"));
        assert_eq!(reading.pollutants.pm25, Some(145.0));
        assert_eq!(reading.pollutants.pm10, Some(88.5));
        assert_eq!(reading.pollutants.co, None);
        assert_eq!(reading.fetch_status, FetchStatus::Ok);
        assert!(reading.raw_payload.is_some());
    }

    #[test]
    fn test_missing_time_falls_back_to_fetch_time() {
        let reading = normalize(json!({"status": "ok", "data": {"aqi": 42}})).unwrap();
        assert_eq!(reading.timestamp, fetched_at());

        let reading = normalize(json!({"data": {"aqi": 42, "time": {"s": "x"}}})).unwrap();
        assert_eq!(reading.timestamp, fetched_at());
    }

    #[test]
    fn test_numeric_string_aqi() {
        assert_eq!(normalize(json!({"data": {"aqi": " 77 "}})).unwrap().aqi_value, 77.0);
    }

    #[test]
    fn test_negative_aqi_rejected() {
        assert!(matches!(
            normalize(json!({"data": {"aqi": -5}})),
            Err(ValidationFailure::InvalidData(_))
        ));
    }

    #[test]
    fn test_out_of_range_and_placeholder_rejected() {
        for aqi in [json!(1000.5), json!("-"), json!(null), json!("high"), json!([1])] {
            assert!(
                normalize(json!({"data": {"aqi": aqi}})).is_err(),
                "aqi {} should be rejected",
                aqi
            );
        }
        assert!(normalize(json!({"data": {}})).is_err());
        assert!(normalize(json!({"data": "Unknown station"})).is_err());
    }

    #[test]
    fn test_bounds_inclusive() {
        assert_eq!(normalize(json!({"data": {"aqi": 0}})).unwrap().aqi_value, 0.0);
        assert_eq!(
            normalize(json!({"data": {"aqi": 1000}})).unwrap().aqi_value,
            MAX_AQI
        );
    }

    #[test]
    fn test_unparseable_time_rejected() {
        let err = normalize(json!({"data": {"aqi": 50, "time": {"iso": "yesterday"}}}));
        assert!(matches!(err, Err(ValidationFailure::InvalidData(_))));
    }

    #[test]
    fn test_raw_payload_not_retained_when_disabled() {
        let reading = Normalizer::new(false)
            .normalize(&City::from("Delhi"), &payload(json!({"data": {"aqi": 10}})))
            .unwrap();
        assert!(reading.raw_payload.is_none());
    }
}
