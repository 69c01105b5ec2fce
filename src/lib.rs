// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! AQI Tracker: scheduled air-quality ingestion and query API
//!
//! This crate fetches AQI readings for a configured set of cities from the
//! WAQI provider on a fixed interval, stores them as an append-only time
//! series, and serves them to a dashboard over a read-only JSON API.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{CycleMonitor, QueryService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub query: QueryService,
    pub monitor: Arc<CycleMonitor>,
}
