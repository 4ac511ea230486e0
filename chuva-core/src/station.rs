use crate::{
    config::{StationConfig, StationSourceKind},
    error::StationError,
    station::{http::HttpStation, simulated::SimulatedStation},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, str::FromStr};
use tracing::warn;

pub mod http;
pub mod simulated;

/// Longest series a source will produce, about ten years.
pub const MAX_STATION_DAYS: u32 = 3660;

fn check_days(days: u32) -> Result<(), StationError> {
    if days == 0 || days > MAX_STATION_DAYS {
        return Err(StationError::DayCount {
            value: days,
            max: MAX_STATION_DAYS,
        });
    }
    Ok(())
}

/// Series published by ANA (Agência Nacional de Águas) stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// Rainfall, mm.
    Precipitacao,
    /// River level, m.
    Nivel,
    /// Discharge, m³/s.
    Descarga,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Precipitacao => "precipitacao",
            DataKind::Nivel => "nivel",
            DataKind::Descarga => "descarga",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            DataKind::Precipitacao => "mm",
            DataKind::Nivel => "m",
            DataKind::Descarga => "m³/s",
        }
    }

    pub const fn all() -> &'static [DataKind] {
        &[DataKind::Precipitacao, DataKind::Nivel, DataKind::Descarga]
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DataKind {
    type Error = StationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();

        match lower.as_str() {
            "precipitacao" | "precipitação" => Ok(DataKind::Precipitacao),
            "nivel" | "nível" => Ok(DataKind::Nivel),
            "descarga" | "vazao" | "vazão" => Ok(DataKind::Descarga),
            _ => Err(StationError::UnknownKind(value.to_string())),
        }
    }
}

impl FromStr for DataKind {
    type Err = StationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataKind::try_from(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub kind: DataKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationReading {
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "valor")]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSeries {
    pub code: String,
    pub kind: DataKind,
    pub readings: Vec<StationReading>,
}

#[async_trait]
pub trait StationSource: Send + Sync + Debug {
    /// Daily values for the last `days` days, oldest first.
    async fn fetch(&self, code: &str, days: u32, kind: DataKind) -> Result<StationSeries, StationError>;

    fn name(&self) -> &'static str;
}

/// Stations known to the simulated source, all in São Paulo state.
pub fn catalog() -> Vec<StationInfo> {
    use DataKind::*;

    const ROWS: [(&str, &str, DataKind); 25] = [
        ("35520000", "Estação A - Campinas", Precipitacao),
        ("35520002", "Estação B - São Paulo", Nivel),
        ("35520004", "Estação C - Santos", Precipitacao),
        ("35520005", "Estação D - Ribeirão Preto", Descarga),
        ("35520006", "Estação E - São José do Rio Preto", Nivel),
        ("45010001", "Estação F - Bauru", Precipitacao),
        ("45010002", "Estação G - Presidente Prudente", Nivel),
        ("45010003", "Estação H - Piracicaba", Precipitacao),
        ("46020004", "Estação I - Jundiaí", Descarga),
        ("46020005", "Estação J - Sorocaba", Nivel),
        ("47030006", "Estação K - São Carlos", Precipitacao),
        ("47030007", "Estação L - Araraquara", Nivel),
        ("48040008", "Estação M - Marília", Precipitacao),
        ("48040009", "Estação N - Campinas", Descarga),
        ("49050010", "Estação O - Taubaté", Nivel),
        ("49050011", "Estação P - Mogi das Cruzes", Precipitacao),
        ("50060012", "Estação Q - São Vicente", Nivel),
        ("50060013", "Estação R - Guarulhos", Precipitacao),
        ("51070014", "Estação S - Botucatu", Descarga),
        ("51070015", "Estação T - Franca", Nivel),
        ("52080016", "Estação U - Barretos", Precipitacao),
        ("52080017", "Estação V - Assis", Nivel),
        ("53090018", "Estação W - Lins", Precipitacao),
        ("53090019", "Estação X - Araçatuba", Descarga),
        ("54100020", "Estação Y - Rio Claro", Nivel),
    ];

    ROWS.iter()
        .map(|&(code, name, kind)| StationInfo { code, name, kind })
        .collect()
}

pub fn find_station(code: &str) -> Option<StationInfo> {
    catalog().into_iter().find(|s| s.code == code.trim())
}

/// Construct the configured station source.
pub fn station_from_config(config: &StationConfig, seed: Option<u64>) -> Result<Box<dyn StationSource>, StationError> {
    let source: Box<dyn StationSource> = match config.source {
        StationSourceKind::Simulated => Box::new(SimulatedStation::new(seed)),
        StationSourceKind::Http => Box::new(HttpStation::new(&config.base_url, config.timeout())?),
    };
    Ok(source)
}

/// Fetch from the configured source. When the HTTP service cannot be built
/// or fails, the series is simulated instead.
pub async fn fetch_with_fallback(
    config: &StationConfig,
    seed: Option<u64>,
    code: &str,
    days: u32,
    kind: DataKind,
) -> Result<StationSeries, StationError> {
    fetch_or_simulate(config, SimulatedStation::new(seed), seed, code, days, kind).await
}

async fn fetch_or_simulate(
    config: &StationConfig,
    fallback: SimulatedStation,
    seed: Option<u64>,
    code: &str,
    days: u32,
    kind: DataKind,
) -> Result<StationSeries, StationError> {
    check_days(days)?;

    let fetched = match station_from_config(config, seed) {
        Ok(source) => source.fetch(code, days, kind).await,
        Err(e) => Err(e),
    };

    match fetched {
        Ok(series) => Ok(series),
        Err(e) if config.source == StationSourceKind::Http => {
            warn!(error = %e, "station service failed, falling back to simulated data");
            fallback.fetch(code, days, kind).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_kind_as_str_roundtrip() {
        for kind in DataKind::all() {
            let parsed = DataKind::try_from(kind.as_str()).expect("roundtrip should succeed");
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn accented_kind_names_parse() {
        assert_eq!("Nível".parse::<DataKind>().unwrap(), DataKind::Nivel);
        assert_eq!("vazão".parse::<DataKind>().unwrap(), DataKind::Descarga);
    }

    #[test]
    fn unknown_kind_error() {
        let err = DataKind::try_from("temperatura").unwrap_err();
        assert!(err.to_string().contains("Unknown data kind 'temperatura'"));
    }

    #[test]
    fn catalog_has_unique_codes() {
        let stations = catalog();
        assert_eq!(stations.len(), 25);
        for (i, a) in stations.iter().enumerate() {
            assert!(stations[i + 1..].iter().all(|b| b.code != a.code));
        }
        assert_eq!(find_station(" 47030006").map(|s| s.kind), Some(DataKind::Precipitacao));
        assert!(find_station("0").is_none());
    }

    #[test]
    fn config_selects_source() {
        let mut cfg = StationConfig::default();
        assert_eq!(station_from_config(&cfg, Some(1)).unwrap().name(), "simulated");

        cfg.source = StationSourceKind::Http;
        assert_eq!(station_from_config(&cfg, None).unwrap().name(), "http");

        cfg.base_url = "not a url".into();
        assert!(matches!(
            station_from_config(&cfg, None).unwrap_err(),
            StationError::BadUrl { .. }
        ));
    }

    #[test]
    fn day_limits() {
        assert!(check_days(1).is_ok());
        assert!(check_days(MAX_STATION_DAYS).is_ok());
        assert!(matches!(check_days(0), Err(StationError::DayCount { value: 0, .. })));
        assert!(matches!(
            check_days(u32::MAX),
            Err(StationError::DayCount { max: MAX_STATION_DAYS, .. })
        ));
    }

    fn unreachable_http() -> StationConfig {
        StationConfig {
            source: StationSourceKind::Http,
            base_url: "http://127.0.0.1:1".into(),
            timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn failed_http_source_falls_back_to_simulated() {
        let end = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let fallback = SimulatedStation::new(Some(5)).ending_at(end);

        let series = fetch_or_simulate(&unreachable_http(), fallback, Some(5), "35520000", 12, DataKind::Nivel)
            .await
            .unwrap();
        assert_eq!(series.readings.len(), 12);
        assert_eq!(series.kind, DataKind::Nivel);
        assert_eq!(series.readings.last().map(|r| r.date), Some(end));

        let public = fetch_with_fallback(&unreachable_http(), Some(5), "35520000", 12, DataKind::Nivel)
            .await
            .unwrap();
        assert_eq!(public.readings.len(), 12);
    }

    #[tokio::test]
    async fn bad_base_url_also_falls_back() {
        let cfg = StationConfig {
            base_url: "::".into(),
            ..unreachable_http()
        };
        let series = fetch_with_fallback(&cfg, Some(1), "45010001", 3, DataKind::Precipitacao)
            .await
            .unwrap();
        assert_eq!(series.readings.len(), 3);
    }

    #[tokio::test]
    async fn day_count_is_checked_before_any_source() {
        let err = fetch_with_fallback(&unreachable_http(), Some(1), "35520000", MAX_STATION_DAYS + 1, DataKind::Nivel)
            .await
            .unwrap_err();
        assert!(matches!(err, StationError::DayCount { .. }));
    }
}
