use std::f64::consts::PI;

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Exp1, StandardNormal};
use tracing::info;

use crate::{error::StationError, history::name_seed, model::round2};

use super::{DataKind, StationReading, StationSeries, StationSource};

/// Generates plausible-looking series without any network access.
#[derive(Debug, Clone, Default)]
pub struct SimulatedStation {
    seed: Option<u64>,
    end: Option<NaiveDate>,
}

impl SimulatedStation {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed, end: None }
    }

    /// Fix the last date of generated series instead of using today.
    pub fn ending_at(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    fn rng_for(&self, code: &str) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ name_seed(code)),
            None => StdRng::from_os_rng(),
        }
    }
}

fn normal<R: Rng + ?Sized>(rng: &mut R, std: f64) -> f64 {
    let z: f64 = StandardNormal.sample(rng);
    z * std
}

/// Raw values for `days` consecutive days, rounded to 2 decimals.
pub fn generate<R: Rng + ?Sized>(kind: DataKind, days: usize, rng: &mut R) -> Vec<f64> {
    (0..days)
        .map(|i| {
            let value = match kind {
                // sporadic, with peaks
                DataKind::Precipitacao => {
                    let e: f64 = Exp1.sample(rng);
                    (e * 0.5 + normal(rng, 3.0)).max(0.0)
                }
                // one seasonal cycle over the window
                DataKind::Nivel => {
                    let phase = if days > 1 {
                        2.0 * PI * i as f64 / (days - 1) as f64
                    } else {
                        0.0
                    };
                    (5.0 + phase.sin() * 2.0 + normal(rng, 0.5)).max(0.0)
                }
                // log-normal around 20 m³/s
                DataKind::Descarga => (20.0f64.ln() + normal(rng, 0.4)).exp(),
            };
            round2(value)
        })
        .collect()
}

#[async_trait]
impl StationSource for SimulatedStation {
    async fn fetch(&self, code: &str, days: u32, kind: DataKind) -> Result<StationSeries, StationError> {
        super::check_days(days)?;

        info!(station = code, %kind, days, "simulating ANA station data");

        let end = self.end.unwrap_or_else(|| Local::now().date_naive());
        let mut rng = self.rng_for(code);
        let values = generate(kind, days as usize, &mut rng);

        let readings = values
            .into_iter()
            .enumerate()
            .filter_map(|(i, value)| {
                let back = u64::from(days) - 1 - i as u64;
                end.checked_sub_days(Days::new(back))
                    .map(|date| StationReading { date, value })
            })
            .collect();

        Ok(StationSeries {
            code: code.to_string(),
            kind,
            readings,
        })
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::MAX_STATION_DAYS;

    fn end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    #[tokio::test]
    async fn fetch_returns_requested_days_ending_at_end() {
        let source = SimulatedStation::new(Some(11)).ending_at(end());
        let series = source.fetch("35520000", 15, DataKind::Precipitacao).await.unwrap();

        assert_eq!(series.readings.len(), 15);
        assert_eq!(series.readings.last().unwrap().date, end());
        assert_eq!(series.readings[0].date, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert!(series.readings.iter().all(|r| r.value >= 0.0));
    }

    #[tokio::test]
    async fn seeded_source_is_reproducible_per_station() {
        let source = SimulatedStation::new(Some(3)).ending_at(end());
        let a = source.fetch("45010002", 10, DataKind::Nivel).await.unwrap();
        let b = source.fetch("45010002", 10, DataKind::Nivel).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn day_count_outside_limits_is_an_error() {
        let source = SimulatedStation::new(Some(3));
        let err = source.fetch("45010002", 0, DataKind::Nivel).await.unwrap_err();
        assert!(matches!(err, StationError::DayCount { value: 0, .. }));

        let err = source.fetch("45010002", u32::MAX, DataKind::Nivel).await.unwrap_err();
        assert!(matches!(err, StationError::DayCount { value: u32::MAX, max: MAX_STATION_DAYS }));

        let longest = source
            .ending_at(end())
            .fetch("45010002", MAX_STATION_DAYS, DataKind::Nivel)
            .await
            .unwrap();
        assert_eq!(longest.readings.len(), MAX_STATION_DAYS as usize);
    }

    #[test]
    fn level_follows_a_seasonal_cycle() {
        let mut rng = StdRng::seed_from_u64(8);
        let values = generate(DataKind::Nivel, 61, &mut rng);
        // quarter cycle peaks near 7 m, three-quarter trough near 3 m
        assert!(values[15] > values[45]);
        assert!(values.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn discharge_is_positive() {
        let mut rng = StdRng::seed_from_u64(4);
        let values = generate(DataKind::Descarga, 200, &mut rng);
        assert!(values.iter().all(|v| *v > 0.0));
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!((10.0..40.0).contains(&mean), "mean {mean}");
    }

    #[test]
    fn single_day_level_does_not_divide_by_zero() {
        let values = generate(DataKind::Nivel, 1, &mut StdRng::seed_from_u64(1));
        assert_eq!(values.len(), 1);
        assert!(values[0].is_finite());
    }
}
