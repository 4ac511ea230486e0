use serde::Serialize;
use thiserror::Error;

/// Error summary of estimated against observed precipitation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelMetrics {
    pub rmse: f64,
    pub mae: f64,
    /// `None` when the observed series has no variance.
    pub r2: Option<f64>,
}

impl ModelMetrics {
    /// Published figures, quoted as-is. Not derived from any data.
    pub const REFERENCE: ModelMetrics = ModelMetrics {
        rmse: 2.45,
        mae: 1.87,
        r2: Some(0.78),
    };
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("series lengths differ: {observed} observed vs {estimated} estimated")]
    LengthMismatch { observed: usize, estimated: usize },

    #[error("cannot evaluate empty series")]
    Empty,
}

pub fn evaluate(observed: &[f64], estimated: &[f64]) -> Result<ModelMetrics, MetricsError> {
    if observed.len() != estimated.len() {
        return Err(MetricsError::LengthMismatch {
            observed: observed.len(),
            estimated: estimated.len(),
        });
    }
    if observed.is_empty() {
        return Err(MetricsError::Empty);
    }

    let n = observed.len() as f64;
    let (mut sq, mut abs) = (0.0, 0.0);
    for (o, e) in observed.iter().zip(estimated) {
        let d = e - o;
        sq += d * d;
        abs += d.abs();
    }

    let mean = observed.iter().sum::<f64>() / n;
    let total: f64 = observed.iter().map(|o| (o - mean).powi(2)).sum();
    let r2 = (total > 0.0).then(|| 1.0 - sq / total);

    Ok(ModelMetrics {
        rmse: (sq / n).sqrt(),
        mae: abs / n,
        r2,
    })
}
