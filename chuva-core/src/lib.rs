//! Core library for the `chuva` CLI.
//!
//! This crate defines:
//! - Weather samples, validation and the municipality table
//! - Feature engineering over uploaded CSV tables
//! - A closed-form precipitation heuristic (not a trained model)
//! - Simulated historical series and error metrics
//! - Sources for ANA hydrological station data
//! - Configuration handling
//!
//! It is used by `chuva-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod dataset;
pub mod error;
pub mod estimator;
pub mod features;
pub mod history;
pub mod metrics;
pub mod model;
pub mod municipality;
pub mod station;

pub use config::{Config, StationConfig, StationSourceKind};
pub use error::{DatasetError, StationError, ValidationError};
pub use estimator::{Coefficients, ForecastInput, RainEstimator};
pub use features::{ColumnMapping, FeatureRow, FeatureTable, RawTable};
pub use metrics::ModelMetrics;
pub use model::{ForecastPoint, ForecastSeries, WeatherSample};
pub use municipality::Municipality;
pub use station::{DataKind, StationSource, fetch_with_fallback, station_from_config};
