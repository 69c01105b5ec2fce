// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod city;
pub mod outcome;
pub mod reading;

pub use city::City;
pub use outcome::{CycleReport, CycleStatus, FailureCause, FetchOutcome};
pub use reading::{AqiCategory, FetchStatus, Pollutants, Reading};
