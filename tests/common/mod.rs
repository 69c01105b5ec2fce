// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use aqi_tracker::config::Config;
use aqi_tracker::db::ReadingStore;
use aqi_tracker::models::{City, FetchStatus, Pollutants, Reading};
use aqi_tracker::routes::create_router;
use aqi_tracker::services::{
    AqiProvider, CycleMonitor, ProviderError, ProviderResult, QueryService, RawPayload,
};
use aqi_tracker::AppState;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Config for `cities` with near-zero retry delays.
#[allow(dead_code)]
pub fn test_config(cities: &[&str]) -> Config {
    Config {
        cities: cities.iter().map(|c| City::from(*c)).collect(),
        ..Config::test_default()
    }
}

#[allow(dead_code)]
pub fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, day, hour, 0, 0).unwrap()
}

/// WAQI-shaped success body.
#[allow(dead_code)]
pub fn feed_body(aqi: serde_json::Value, iso: &str) -> serde_json::Value {
    json!({
        "status": "ok",
        "data": {
            "aqi": aqi,
            "idx": 7024,
            "dominentpol": "pm25",
            "city": {"name": "Test Station"},
            "iaqi": {"pm25": {"v": 145}, "no2": {"v": 12.4}},
            "time": {"iso": iso}
        }
    })
}

#[allow(dead_code)]
pub fn feed(aqi: f64, at: DateTime<Utc>) -> ProviderResult {
    Ok(RawPayload {
        body: feed_body(json!(aqi), &at.to_rfc3339()),
        fetched_at: Utc::now(),
    })
}

#[allow(dead_code)]
pub fn network_error() -> ProviderResult {
    Err(ProviderError::Network("connection refused".to_string()))
}

#[allow(dead_code)]
pub fn reading(city: &str, at: DateTime<Utc>, aqi: f64) -> Reading {
    Reading {
        city: City::from(city),
        timestamp: at,
        aqi_value: aqi,
        fetched_at: at,
        station: None,
        dominant_pollutant: None,
        pollutants: Pollutants::default(),
        raw_payload: None,
        fetch_status: FetchStatus::Ok,
    }
}

/// Provider that replays canned results per city.
///
/// Each call pops the next scripted result; the last one repeats forever.
/// An optional gate holds every call until permits are added.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<City, VecDeque<ProviderResult>>>,
    calls: Mutex<HashMap<City, u32>>,
    gate: Option<Arc<Semaphore>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn script(self, city: &str, results: Vec<ProviderResult>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(City::from(city), results.into());
        self
    }

    pub fn calls(&self, city: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&City::from(city))
            .copied()
            .unwrap_or(0)
    }
}

impl AqiProvider for ScriptedProvider {
    async fn fetch(&self, city: &City) -> ProviderResult {
        *self.calls.lock().unwrap().entry(city.clone()).or_default() += 1;

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }

        let mut scripts = self.scripts.lock().unwrap();
        let Some(queue) = scripts.get_mut(city) else {
            return Err(ProviderError::BadResponse(format!("no script for {}", city)));
        };
        if queue.len() > 1 {
            queue.pop_front().expect("queue not empty")
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ProviderError::BadResponse("empty script".to_string())))
        }
    }
}

/// Create a test app over `store`.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(store: Arc<ReadingStore>) -> (axum::Router, Arc<AppState>) {
    let config = Config {
        cities: store.cities().to_vec(),
        ..Config::test_default()
    };

    let state = Arc::new(AppState {
        config,
        query: QueryService::new(store),
        monitor: CycleMonitor::new(),
    });

    (create_router(state.clone()), state)
}
