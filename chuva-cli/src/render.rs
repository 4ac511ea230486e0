//! Human-readable rendering. Every function returns the text so it can be tested.

use std::fmt::Write;

use chrono::NaiveDate;
use chuva_core::{
    FeatureTable, ForecastSeries, Municipality,
    history::{HistoryPoint, StateValue},
    metrics::ModelMetrics,
    station::{StationInfo, StationSeries},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MunicipalityEstimate {
    #[serde(flatten)]
    pub municipality: Municipality,
    pub precipitation_mm: f64,
}

#[derive(Debug, Serialize)]
pub struct MapReport {
    pub date: NaiveDate,
    pub states: Vec<StateValue>,
    pub municipalities: Vec<MunicipalityEstimate>,
}

const BAR_WIDTH: f64 = 30.0;

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 {
        return String::new();
    }
    let n = ((value / max) * BAR_WIDTH).round().clamp(0.0, BAR_WIDTH) as usize;
    "█".repeat(n)
}

fn fmt_r2(r2: Option<f64>) -> String {
    r2.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

pub fn map(report: &MapReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Estimated precipitation by state ({}, simulated)", report.date);
    let max = report.states.iter().map(|s| s.precipitation_mm).fold(0.0, f64::max);
    for s in &report.states {
        let _ = writeln!(
            out,
            "  {:<2} {:<20} {:>6.2} mm  {}",
            s.state,
            s.name,
            s.precipitation_mm,
            bar(s.precipitation_mm, max)
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Municipalities");
    let _ = writeln!(
        out,
        "  {:<16} {:<2} {:>9} {:>9} {:>6} {:>9}",
        "name", "uf", "lat", "lon", "factor", "mm"
    );
    for e in &report.municipalities {
        let m = &e.municipality;
        let _ = writeln!(
            out,
            "  {:<16} {:<2} {:>9.4} {:>9.4} {:>6.2} {:>9.2}",
            m.name, m.state, m.latitude, m.longitude, m.factor, e.precipitation_mm
        );
    }
    out
}

pub fn forecast(series: &ForecastSeries) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Precipitation estimate for {}", series.location);
    let max = series.max_mm();
    for p in &series.points {
        let _ = writeln!(
            out,
            "  {}  {:>6.2} mm  {}",
            p.date.format("%Y-%m-%d"),
            p.precipitation_mm,
            bar(p.precipitation_mm, max)
        );
    }
    let _ = writeln!(
        out,
        "Total {:.2} mm, peak {:.2} mm, {} day(s) with at least 1 mm",
        series.total_mm(),
        max,
        series.rainy_days()
    );
    out
}

pub fn predictions_preview(table: &FeatureTable, predictions: &[f64], limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<10}  {:>8}", "data", "mm");
    for (row, value) in table.rows.iter().zip(predictions).take(limit) {
        let _ = writeln!(out, "{}  {:>8.2}", row.sample.date.format("%Y-%m-%d"), value);
    }
    if predictions.len() > limit {
        let _ = writeln!(out, "... {} more", predictions.len() - limit);
    }
    out
}

pub fn stations(stations: &[StationInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:<13} name", "code", "kind");
    for s in stations {
        let _ = writeln!(out, "{:<10} {:<13} {}", s.code, s.kind, s.name);
    }
    out
}

pub fn station(series: &StationSeries, info: Option<&StationInfo>) -> String {
    let mut out = String::new();
    let name = info.map_or("unlisted station", |i| i.name);
    let _ = writeln!(out, "{} ({}) - {} [{}]", series.code, name, series.kind, series.kind.unit());
    for r in &series.readings {
        let _ = writeln!(out, "  {}  {:>8.2}", r.date.format("%Y-%m-%d"), r.value);
    }
    out
}

pub fn about(reference: &ModelMetrics, computed: &ModelMetrics, comparison: &[HistoryPoint]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "chuva estimates daily rainfall (mm) for Brazilian municipalities.");
    let _ = writeln!(
        out,
        "Estimates are a closed-form function of temperature, humidity, pressure, wind and\n\
         solar radiation with random noise. No model is trained and no result is validated\n\
         against measurements."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Reference metrics (quoted, not computed)");
    let _ = writeln!(
        out,
        "  RMSE {:.2} mm  MAE {:.2} mm  R² {}",
        reference.rmse,
        reference.mae,
        fmt_r2(reference.r2)
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Simulated comparison over {} days", comparison.len());
    let _ = writeln!(out, "  {:<10}  {:>8}  {:>8}", "data", "observed", "estimate");
    for p in comparison {
        let _ = writeln!(
            out,
            "  {}  {:>8.2}  {:>8.2}",
            p.date.format("%Y-%m-%d"),
            p.observed_mm,
            p.estimated_mm
        );
    }
    let _ = writeln!(
        out,
        "  RMSE {:.2} mm  MAE {:.2} mm  R² {}",
        computed.rmse,
        computed.mae,
        fmt_r2(computed.r2)
    );
    out
}
