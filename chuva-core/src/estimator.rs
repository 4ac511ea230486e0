//! Closed-form precipitation heuristic.
//!
//! This is not a trained model: the estimate is a weighted sum of simple
//! weather terms, scaled by season and municipality, plus Gaussian noise.

use chrono::{Days, NaiveDate};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    features::{FeatureRow, FeatureTable},
    model::{ForecastPoint, ForecastSeries, WeatherSample, bounds, precipitation},
    municipality::Municipality,
};

pub const MAX_FORECAST_DAYS: u32 = 30;

/// Weights of the heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    /// mm at 100 % humidity, zero at `humidity_threshold` and below.
    pub humidity: f64,
    pub humidity_threshold: f64,
    /// mm per hPa below `reference_pressure`.
    pub pressure_deficit: f64,
    pub reference_pressure: f64,
    /// mm per °C of mean temperature above `warm_threshold`.
    pub warmth: f64,
    pub warm_threshold: f64,
    /// mm per m/s of wind.
    pub wind: f64,
    /// mm removed per MJ/m² of solar radiation.
    pub radiation: f64,
    /// Relative swing between the January peak and the July trough.
    pub wet_season_amplitude: f64,
    pub noise_std: f64,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            humidity: 14.0,
            humidity_threshold: 55.0,
            pressure_deficit: 0.45,
            reference_pressure: 1016.0,
            warmth: 0.35,
            warm_threshold: 18.0,
            wind: 0.25,
            radiation: 0.12,
            wet_season_amplitude: 0.5,
            noise_std: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RainEstimator {
    coefficients: Coefficients,
}

impl RainEstimator {
    pub fn new(coefficients: Coefficients) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    /// Noise-free part of the estimate, before clamping.
    pub fn expected(&self, row: &FeatureRow, factor: f64) -> f64 {
        let c = &self.coefficients;

        let humidity = ((row.humidity_ma3 - c.humidity_threshold) / (100.0 - c.humidity_threshold)).max(0.0)
            * c.humidity;
        let pressure = (c.reference_pressure - row.pressure_ma3).max(0.0) * c.pressure_deficit;
        let warmth = (row.temp_mean - c.warm_threshold).max(0.0) * c.warmth;
        let wind = row.sample.wind_speed * c.wind;
        let radiation = row.solar_ma3 * c.radiation;

        let season = 1.0 + c.wet_season_amplitude * row.month_cos;

        (humidity + pressure + warmth + wind - radiation) * season * factor
    }

    pub fn estimate<R: Rng + ?Sized>(&self, row: &FeatureRow, factor: f64, rng: &mut R) -> f64 {
        let z: f64 = StandardNormal.sample(rng);
        let std = self.coefficients.noise_std;
        let noise = if std.is_finite() { z * std.abs() } else { 0.0 };
        precipitation(self.expected(row, factor) + noise)
    }

    /// Validate a lone sample, then estimate it.
    pub fn estimate_sample<R: Rng + ?Sized>(
        &self,
        sample: &WeatherSample,
        factor: f64,
        rng: &mut R,
    ) -> Result<f64, ValidationError> {
        sample.validate()?;
        Ok(self.estimate(&FeatureRow::from_sample(sample.clone()), factor, rng))
    }

    /// One estimate per row of an engineered table.
    pub fn batch<R: Rng + ?Sized>(&self, table: &FeatureTable, factor: f64, rng: &mut R) -> Vec<f64> {
        table
            .rows
            .iter()
            .map(|row| self.estimate(row, factor, rng))
            .collect()
    }

    /// Expand one set of conditions into a daily series for a municipality.
    pub fn forecast<R: Rng + ?Sized>(
        &self,
        input: &ForecastInput,
        municipality: &Municipality,
        rng: &mut R,
    ) -> Result<ForecastSeries, ValidationError> {
        input.validate()?;

        let mut points = Vec::with_capacity(input.days as usize);
        for offset in 0..input.days {
            let date = input
                .start
                .checked_add_days(Days::new(u64::from(offset)))
                .unwrap_or(input.start);

            let sample = input.jittered_sample(date, rng);
            let value = self.estimate(&FeatureRow::from_sample(sample), municipality.factor, rng);
            points.push(ForecastPoint {
                date,
                precipitation_mm: value,
            });
        }

        Ok(ForecastSeries {
            location: format!("{}/{}", municipality.name, municipality.state),
            points,
        })
    }
}

/// The adjustable conditions of a forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInput {
    pub start: NaiveDate,
    pub days: u32,
    pub temp_max: f64,
    pub temp_min: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub solar_radiation: f64,
}

impl ForecastInput {
    /// Typical summer afternoon in the São Paulo interior.
    pub fn typical(start: NaiveDate) -> Self {
        Self {
            start,
            days: 7,
            temp_max: 30.0,
            temp_min: 19.0,
            humidity: 75.0,
            pressure: 1012.0,
            wind_speed: 3.0,
            solar_radiation: 18.0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.days == 0 || self.days > MAX_FORECAST_DAYS {
            return Err(ValidationError::DayCount {
                value: self.days,
                max: MAX_FORECAST_DAYS,
            });
        }
        self.as_sample(self.start).validate()
    }

    /// One forecast day: the conditions with daily jitter, kept inside the
    /// field bounds and with `temp_min < temp_max`.
    pub fn jittered_sample<R: Rng + ?Sized>(&self, date: NaiveDate, rng: &mut R) -> WeatherSample {
        let jitter = |rng: &mut R, value: f64, spread: f64, (min, max): (f64, f64)| {
            (value + rng.random_range(-spread..=spread)).clamp(min, max)
        };
        let (t_lo, t_hi) = bounds::TEMPERATURE;

        let mut temp_max = jitter(rng, self.temp_max, 1.0, bounds::TEMPERATURE);
        let mut temp_min = jitter(rng, self.temp_min, 1.0, bounds::TEMPERATURE);
        if temp_min >= temp_max {
            std::mem::swap(&mut temp_min, &mut temp_max);
            temp_max = (temp_max + 0.1).clamp(t_lo, t_hi);
            if temp_min >= temp_max {
                temp_min = (temp_max - 0.1).clamp(t_lo, t_hi);
            }
        }

        WeatherSample {
            date,
            temp_max,
            temp_min,
            humidity: jitter(rng, self.humidity, 5.0, bounds::HUMIDITY),
            pressure: jitter(rng, self.pressure, 2.0, bounds::PRESSURE),
            wind_speed: self.wind_speed,
            solar_radiation: self.solar_radiation,
        }
    }

    fn as_sample(&self, date: NaiveDate) -> WeatherSample {
        WeatherSample {
            date,
            temp_max: self.temp_max,
            temp_min: self.temp_min,
            humidity: self.humidity,
            pressure: self.pressure,
            wind_speed: self.wind_speed,
            solar_radiation: self.solar_radiation,
        }
    }
}
