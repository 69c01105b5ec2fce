// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Configured city identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A city the pipeline fetches readings for.
///
/// The string is passed to the provider verbatim as its location key,
/// so it can be a plain name ("Delhi") or a station key ("@7024").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct City(String);

impl City {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for City {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Parse a comma-separated city list.
///
/// Entries are trimmed, blanks dropped, and repeats removed while keeping
/// first-seen order.
pub fn parse_city_list(raw: &str) -> Vec<City> {
    let mut cities: Vec<City> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let city = City::new(name);
        if !cities.contains(&city) {
            cities.push(city);
        }
    }
    cities
}
