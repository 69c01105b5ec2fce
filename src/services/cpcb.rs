// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Indian CPCB AQI from raw pollutant concentrations.
//!
//! Each pollutant's sub-index is a linear interpolation within its
//! breakpoint band; the overall AQI is the worst sub-index. Concentrations
//! are µg/m³ except CO, which is mg/m³.

use serde::{Deserialize, Serialize};

/// (index low, index high, concentration low, concentration high)
type Band = (f64, f64, f64, f64);

const PM25: [Band; 6] = [
    (0.0, 50.0, 0.0, 30.0),
    (51.0, 100.0, 31.0, 60.0),
    (101.0, 200.0, 61.0, 90.0),
    (201.0, 300.0, 91.0, 120.0),
    (301.0, 400.0, 121.0, 250.0),
    (401.0, 500.0, 251.0, 1000.0),
];
const PM10: [Band; 6] = [
    (0.0, 50.0, 0.0, 50.0),
    (51.0, 100.0, 51.0, 100.0),
    (101.0, 200.0, 101.0, 250.0),
    (201.0, 300.0, 251.0, 350.0),
    (301.0, 400.0, 351.0, 430.0),
    (401.0, 500.0, 431.0, 2000.0),
];
const CO: [Band; 6] = [
    (0.0, 50.0, 0.0, 1.0),
    (51.0, 100.0, 1.1, 2.0),
    (101.0, 200.0, 2.1, 10.0),
    (201.0, 300.0, 10.1, 17.0),
    (301.0, 400.0, 17.1, 34.0),
    (401.0, 500.0, 34.1, 100.0),
];
const O3: [Band; 6] = [
    (0.0, 50.0, 0.0, 50.0),
    (51.0, 100.0, 51.0, 100.0),
    (101.0, 200.0, 101.0, 168.0),
    (201.0, 300.0, 169.0, 208.0),
    (301.0, 400.0, 209.0, 748.0),
    (401.0, 500.0, 749.0, 2000.0),
];
const NO2: [Band; 6] = [
    (0.0, 50.0, 0.0, 40.0),
    (51.0, 100.0, 41.0, 80.0),
    (101.0, 200.0, 81.0, 180.0),
    (201.0, 300.0, 181.0, 280.0),
    (301.0, 400.0, 281.0, 400.0),
    (401.0, 500.0, 401.0, 2000.0),
];
const SO2: [Band; 6] = [
    (0.0, 50.0, 0.0, 40.0),
    (51.0, 100.0, 41.0, 80.0),
    (101.0, 200.0, 81.0, 380.0),
    (201.0, 300.0, 381.0, 800.0),
    (301.0, 400.0, 801.0, 1600.0),
    (401.0, 500.0, 1601.0, 3000.0),
];
const NH3: [Band; 6] = [
    (0.0, 50.0, 0.0, 200.0),
    (51.0, 100.0, 201.0, 400.0),
    (101.0, 200.0, 401.0, 800.0),
    (201.0, 300.0, 801.0, 1200.0),
    (301.0, 400.0, 1201.0, 1800.0),
    (401.0, 500.0, 1801.0, 5000.0),
];
const PB: [Band; 6] = [
    (0.0, 50.0, 0.0, 0.5),
    (51.0, 100.0, 0.6, 1.0),
    (101.0, 200.0, 1.1, 2.0),
    (201.0, 300.0, 2.1, 3.0),
    (301.0, 400.0, 3.1, 3.5),
    (401.0, 500.0, 3.6, 10.0),
];

/// Raw concentrations; absent pollutants are skipped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Concentrations {
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub co: Option<f64>,
    pub so2: Option<f64>,
    pub nh3: Option<f64>,
    pub pb: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CpcbCategory {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
    Severe,
}

impl CpcbCategory {
    pub fn from_aqi(aqi: u32) -> Self {
        match aqi {
            0..=50 => Self::Good,
            51..=100 => Self::Satisfactory,
            101..=200 => Self::Moderate,
            201..=300 => Self::Poor,
            301..=400 => Self::VeryPoor,
            _ => Self::Severe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpcbAqi {
    pub aqi: u32,
    pub category: CpcbCategory,
    pub dominant_pollutant: &'static str,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CpcbError {
    #[error("At least one pollutant concentration is required")]
    NoData,

    #[error("Concentration for {0} must be a finite, non-negative number")]
    InvalidConcentration(&'static str),
}

/// Compute the overall CPCB AQI; ties go to the first pollutant listed.
pub fn compute(values: &Concentrations) -> Result<CpcbAqi, CpcbError> {
    let inputs: [(&'static str, Option<f64>, &[Band; 6]); 8] = [
        ("pm25", values.pm25, &PM25),
        ("pm10", values.pm10, &PM10),
        ("co", values.co, &CO),
        ("no2", values.no2, &NO2),
        ("so2", values.so2, &SO2),
        ("o3", values.o3, &O3),
        ("nh3", values.nh3, &NH3),
        ("pb", values.pb, &PB),
    ];

    let mut worst: Option<(u32, &'static str)> = None;
    for (name, value, bands) in inputs {
        let Some(c) = value else { continue };
        if !c.is_finite() || c < 0.0 {
            return Err(CpcbError::InvalidConcentration(name));
        }
        let index = sub_index(c, bands);
        if worst.map_or(true, |(w, _)| index > w) {
            worst = Some((index, name));
        }
    }

    let (aqi, dominant_pollutant) = worst.ok_or(CpcbError::NoData)?;
    Ok(CpcbAqi {
        aqi,
        category: CpcbCategory::from_aqi(aqi),
        dominant_pollutant,
    })
}

/// Values in the gap between two bands take the upper band's floor; values
/// past the last band are capped at its top index. Halves round to even.
fn sub_index(c: f64, bands: &[Band; 6]) -> u32 {
    for &(i_lo, i_hi, bp_lo, bp_hi) in bands {
        if c <= bp_hi {
            let c = c.max(bp_lo);
            let index = ((i_hi - i_lo) / (bp_hi - bp_lo)) * (c - bp_lo) + i_lo;
            return index.round_ties_even() as u32;
        }
    }
    bands[bands.len() - 1].1 as u32
}
