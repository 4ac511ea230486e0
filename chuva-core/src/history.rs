//! Simulated historical series: what the dashboard offered for download and
//! plotted on its overview pages. Nothing here comes from measurements.

use chrono::{Days, NaiveDate};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Exp1, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    metrics::{self, MetricsError, ModelMetrics},
    model::{precipitation, round2},
    municipality::STATES,
};

/// Mean of the exponential daily rainfall draw, in mm.
pub const OBSERVED_MEAN_MM: f64 = 3.0;
/// Standard deviation of the estimate around the observation, in mm.
pub const ESTIMATE_NOISE_MM: f64 = 0.5;
pub const STATE_RANGE_MM: (f64, f64) = (5.0, 25.0);
/// Longest downloadable history, about ten years.
pub const MAX_HISTORY_DAYS: u32 = 3660;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "observado_mm")]
    pub observed_mm: f64,
    #[serde(rename = "previsto_mm")]
    pub estimated_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateValue {
    pub state: &'static str,
    pub name: &'static str,
    pub precipitation_mm: f64,
}

/// Stable across runs and platforms, unlike `std`'s `DefaultHasher`.
pub fn name_seed(name: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    let hash = name
        .trim()
        .to_lowercase()
        .bytes()
        .fold(FNV_OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME));
    hash % 1000
}

/// `days` consecutive dates ending at `end`, oldest first.
fn dates_ending(end: NaiveDate, days: u32) -> impl Iterator<Item = NaiveDate> {
    (0..days).rev().filter_map(move |back| end.checked_sub_days(Days::new(u64::from(back))))
}

fn observed<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let e: f64 = Exp1.sample(rng);
    round2(e * OBSERVED_MEAN_MM)
}

fn noise<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let z: f64 = StandardNormal.sample(rng);
    z * ESTIMATE_NOISE_MM
}

/// Observations are drawn from `rng`; the estimate noise is seeded from the
/// municipality name, so a municipality always gets the same error pattern.
pub fn simulate_municipality<R: Rng + ?Sized>(
    name: &str,
    days: u32,
    end: NaiveDate,
    rng: &mut R,
) -> Result<Vec<HistoryPoint>, ValidationError> {
    if days == 0 || days > MAX_HISTORY_DAYS {
        return Err(ValidationError::DayCount {
            value: days,
            max: MAX_HISTORY_DAYS,
        });
    }
    let mut name_rng = StdRng::seed_from_u64(name_seed(name));

    Ok(dates_ending(end, days)
        .map(|date| {
            let observed_mm = observed(rng);
            HistoryPoint {
                date,
                observed_mm,
                estimated_mm: precipitation(observed_mm + noise(&mut name_rng)),
            }
        })
        .collect())
}

pub fn simulate_comparison<R: Rng + ?Sized>(days: u32, start: NaiveDate, rng: &mut R) -> Vec<HistoryPoint> {
    (0..days)
        .filter_map(|offset| start.checked_add_days(Days::new(u64::from(offset))))
        .map(|date| {
            let observed_mm = observed(rng);
            HistoryPoint {
                date,
                observed_mm,
                estimated_mm: precipitation(observed_mm + noise(rng)),
            }
        })
        .collect()
}

pub fn evaluate(points: &[HistoryPoint]) -> Result<ModelMetrics, MetricsError> {
    let observed: Vec<f64> = points.iter().map(|p| p.observed_mm).collect();
    let estimated: Vec<f64> = points.iter().map(|p| p.estimated_mm).collect();
    metrics::evaluate(&observed, &estimated)
}

/// One uniform draw per federative unit.
pub fn simulate_state_map<R: Rng + ?Sized>(rng: &mut R) -> Vec<StateValue> {
    let (low, high) = STATE_RANGE_MM;
    STATES
        .iter()
        .map(|&(state, name)| StateValue {
            state,
            name,
            precipitation_mm: round2(rng.random_range(low..high)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    #[test]
    fn name_seed_is_stable_and_bounded() {
        assert_eq!(name_seed("Itirapina"), name_seed("  itirapina "));
        assert!(name_seed("São Paulo") < 1000);
        assert_ne!(name_seed("Curitiba"), name_seed("Recife"));
    }

    #[test]
    fn municipality_history_ends_at_end_date() {
        let mut rng = StdRng::seed_from_u64(5);
        let points = simulate_municipality("Itirapina", 30, end(), &mut rng).unwrap();

        assert_eq!(points.len(), 30);
        assert_eq!(points.last().unwrap().date, end());
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert!(points.iter().all(|p| p.observed_mm >= 0.0 && p.estimated_mm >= 0.0));
    }

    #[test]
    fn estimate_noise_depends_on_name_only() {
        let a = simulate_municipality("Curitiba", 10, end(), &mut StdRng::seed_from_u64(1)).unwrap();
        let b = simulate_municipality("Curitiba", 10, end(), &mut StdRng::seed_from_u64(1)).unwrap();
        let c = simulate_municipality("Recife", 10, end(), &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(a, b);
        let obs = |v: &[HistoryPoint]| v.iter().map(|p| p.observed_mm).collect::<Vec<_>>();
        assert_eq!(obs(&a), obs(&c));
        assert_ne!(a, c);
    }

    #[test]
    fn comparison_metrics_are_small() {
        let points = simulate_comparison(60, end(), &mut StdRng::seed_from_u64(9));
        let m = evaluate(&points).unwrap();
        assert!(m.rmse < 1.5, "rmse {}", m.rmse);
        assert!(m.mae <= m.rmse);
    }

    #[test]
    fn state_map_covers_every_state_in_range() {
        let values = simulate_state_map(&mut StdRng::seed_from_u64(2));
        assert_eq!(values.len(), 27);
        assert!(values.iter().all(|v| (5.0..=25.0).contains(&v.precipitation_mm)));
    }

    #[test]
    fn day_count_is_bounded() {
        let mut rng = StdRng::seed_from_u64(0);
        for days in [0, MAX_HISTORY_DAYS + 1, u32::MAX] {
            assert_eq!(
                simulate_municipality("Natal", days, end(), &mut rng).unwrap_err(),
                ValidationError::DayCount {
                    value: days,
                    max: MAX_HISTORY_DAYS
                }
            );
        }

        let longest = simulate_municipality("Natal", MAX_HISTORY_DAYS, end(), &mut rng).unwrap();
        assert_eq!(longest.len(), MAX_HISTORY_DAYS as usize);
    }
}
