// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - ingestion pipeline and query logic.

pub mod cpcb;
pub mod normalizer;
pub mod provider;
pub mod query;
pub mod retry;
pub mod scheduler;

pub use normalizer::{Normalizer, ValidationFailure};
pub use provider::{AqiProvider, ProviderError, ProviderResult, RawPayload, WaqiClient};
pub use query::{QueryError, QueryService};
pub use retry::RetryPolicy;
pub use scheduler::{CycleMonitor, CycleState, FetchScheduler};
