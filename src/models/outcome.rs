// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-cycle fetch outcomes (transient, never persisted).

use super::{City, FetchStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Classified reason a city's fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCause {
    NetworkError,
    RateLimited,
    BadResponse,
    InvalidData,
    StoreError,
}

impl FailureCause {
    /// Transient causes are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkError | Self::RateLimited)
    }

    pub fn status(self) -> FetchStatus {
        match self {
            Self::NetworkError | Self::RateLimited | Self::BadResponse => {
                FetchStatus::ProviderError
            }
            Self::InvalidData => FetchStatus::InvalidData,
            Self::StoreError => FetchStatus::StoreError,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::BadResponse => "BAD_RESPONSE",
            Self::InvalidData => "INVALID_DATA",
            Self::StoreError => "STORE_ERROR",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of fetching one city during one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub city: City,
    pub status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<FailureCause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Provider calls made for this city (including retries)
    pub attempts: u32,
}

impl FetchOutcome {
    pub fn success(city: City, attempts: u32) -> Self {
        Self {
            city,
            status: FetchStatus::Ok,
            cause: None,
            error_detail: None,
            attempts,
        }
    }

    pub fn failure(city: City, cause: FailureCause, detail: String, attempts: u32) -> Self {
        Self {
            city,
            status: cause.status(),
            cause: Some(cause),
            error_detail: Some(detail),
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Ok
    }
}

/// Terminal state of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    Completed,
    PartiallyFailed,
}

/// Summary of one scheduler cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: CycleStatus,
    pub outcomes: Vec<FetchOutcome>,
}

impl CycleReport {
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        outcomes: Vec<FetchOutcome>,
    ) -> Self {
        let status = if outcomes.iter().all(FetchOutcome::is_success) {
            CycleStatus::Completed
        } else {
            CycleStatus::PartiallyFailed
        };
        Self {
            started_at,
            finished_at,
            status,
            outcomes,
        }
    }

    /// Outcome recorded for `city`, if it was part of the cycle.
    pub fn outcome_for(&self, city: &City) -> Option<&FetchOutcome> {
        self.outcomes.iter().find(|o| &o.city == city)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }
}
