use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Inclusive bounds for each weather field.
pub mod bounds {
    pub const TEMPERATURE: (f64, f64) = (-20.0, 50.0);
    pub const HUMIDITY: (f64, f64) = (0.0, 100.0);
    pub const PRESSURE: (f64, f64) = (850.0, 1100.0);
    pub const WIND_SPEED: (f64, f64) = (0.0, 60.0);
    pub const SOLAR_RADIATION: (f64, f64) = (0.0, 40.0);
}

/// One daily observation, in the column layout of the upload CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    #[serde(rename = "data")]
    pub date: NaiveDate,
    pub temp_max: f64,
    pub temp_min: f64,
    #[serde(rename = "umidade")]
    pub humidity: f64,
    #[serde(rename = "pressao")]
    pub pressure: f64,
    #[serde(rename = "vel_vento")]
    pub wind_speed: f64,
    #[serde(rename = "rad_solar")]
    pub solar_radiation: f64,
}

impl WeatherSample {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check("temp_max", self.temp_max, bounds::TEMPERATURE)?;
        check("temp_min", self.temp_min, bounds::TEMPERATURE)?;
        check("umidade", self.humidity, bounds::HUMIDITY)?;
        check("pressao", self.pressure, bounds::PRESSURE)?;
        check("vel_vento", self.wind_speed, bounds::WIND_SPEED)?;
        check("rad_solar", self.solar_radiation, bounds::SOLAR_RADIATION)?;

        if self.temp_min >= self.temp_max {
            return Err(ValidationError::MinNotBelowMax {
                min: self.temp_min,
                max: self.temp_max,
            });
        }

        Ok(())
    }

    pub fn temp_mean(&self) -> f64 {
        (self.temp_max + self.temp_min) / 2.0
    }
}

fn check(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field, value });
    }
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "precipitacao_mm")]
    pub precipitation_mm: f64,
}

/// Daily precipitation estimates for one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub location: String,
    pub points: Vec<ForecastPoint>,
}

impl ForecastSeries {
    pub fn total_mm(&self) -> f64 {
        round2(self.points.iter().map(|p| p.precipitation_mm).sum())
    }

    pub fn max_mm(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.precipitation_mm)
            .fold(0.0, f64::max)
    }

    /// Days with at least 1 mm.
    pub fn rainy_days(&self) -> usize {
        self.points
            .iter()
            .filter(|p| p.precipitation_mm >= 1.0)
            .count()
    }
}

/// Clamp to a non-negative amount rounded to 2 decimals.
pub fn precipitation(value: f64) -> f64 {
    if value.is_finite() {
        round2(value.max(0.0))
    } else {
        0.0
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
