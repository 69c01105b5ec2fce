// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WAQI API client for fetching city AQI feeds.
//!
//! Handles:
//! - One bounded-time GET per city
//! - Classification of failures (network, rate limit, bad response)
//! - WAQI's in-band `{"status": "error"}` responses
//!
//! Retries are the scheduler's job; every call here is a single attempt.

use crate::config::Config;
use crate::models::{City, FailureCause};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Longest provider error body echoed into outcome details.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Unmodified provider body plus the moment it arrived.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub body: Value,
    pub fetched_at: DateTime<Utc>,
}

/// Classified provider failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Bad response: {0}")]
    BadResponse(String),
}

impl ProviderError {
    pub fn cause(&self) -> FailureCause {
        match self {
            ProviderError::Network(_) => FailureCause::NetworkError,
            ProviderError::RateLimited { .. } => FailureCause::RateLimited,
            ProviderError::BadResponse(_) => FailureCause::BadResponse,
        }
    }
}

pub type ProviderResult = Result<RawPayload, ProviderError>;

/// Source of raw AQI payloads, one call per city.
pub trait AqiProvider: Send + Sync {
    fn fetch(&self, city: &City) -> impl Future<Output = ProviderResult> + Send;
}

/// WAQI (aqicn.org) API client.
#[derive(Clone)]
pub struct WaqiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl WaqiClient {
    /// Create a client; `timeout` bounds each whole request.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            config.provider_url.clone(),
            config.provider_token.clone(),
            config.provider_timeout,
        )
    }

    /// Get the current feed for a city.
    pub async fn get_feed(&self, city: &City) -> ProviderResult {
        let url = format!(
            "{}/feed/{}/",
            self.base_url,
            urlencoding::encode(city.as_str())
        );

        let response = self
            .http
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(city = %city, "WAQI rate limit hit (429)");
            return Err(ProviderError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::BadResponse(format!(
                "HTTP {}: {}",
                status,
                truncate(&body)
            )));
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        let fetched_at = Utc::now();
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::BadResponse(format!("JSON parse error: {}", e)))?;

        check_api_status(&body)?;
        Ok(RawPayload { body, fetched_at })
    }
}

impl AqiProvider for WaqiClient {
    fn fetch(&self, city: &City) -> impl Future<Output = ProviderResult> + Send {
        self.get_feed(city)
    }
}

/// Map a reqwest failure. The URL is dropped since it carries the token.
fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_decode() {
        ProviderError::BadResponse(e.without_url().to_string())
    } else {
        ProviderError::Network(e.without_url().to_string())
    }
}

/// WAQI reports errors in-band with HTTP 200 and `"status": "error"`.
fn check_api_status(body: &Value) -> Result<(), ProviderError> {
    let status = body.get("status").and_then(Value::as_str);
    if status == Some("ok") {
        return Ok(());
    }

    let message = match body.get("data") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };

    if message.to_ascii_lowercase().contains("quota") {
        return Err(ProviderError::RateLimited { retry_after: None });
    }

    Err(ProviderError::BadResponse(format!(
        "provider status {:?}: {}",
        status.unwrap_or("missing"),
        truncate(&message)
    )))
}

/// `Retry-After` in delay-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(s: &str) -> String {
    s.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_ok_status_passes() {
        assert!(check_api_status(&json!({"status": "ok", "data": {"aqi": 10}})).is_ok());
    }

    #[test]
    fn test_unknown_station_is_bad_response() {
        let err = check_api_status(&json!({"status": "error", "data": "Unknown station"}))
            .unwrap_err();
        assert_eq!(err.cause(), FailureCause::BadResponse);
        assert!(err.to_string().contains("Unknown station"));
    }

    #[test]
    fn test_over_quota_is_rate_limited() {
        let err = check_api_status(&json!({"status": "error", "data": "Over quota"})).unwrap_err();
        assert_eq!(err, ProviderError::RateLimited { retry_after: None });
    }

    #[test]
    fn test_missing_status_is_bad_response() {
        let err = check_api_status(&json!({"data": {}})).unwrap_err();
        assert!(matches!(err, ProviderError::BadResponse(_)));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(30)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }
}
