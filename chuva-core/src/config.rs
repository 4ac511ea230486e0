use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    error::ValidationError,
    estimator::MAX_FORECAST_DAYS,
    municipality::{self, DEFAULT_MUNICIPALITY, Municipality},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationSourceKind {
    #[default]
    Simulated,
    Http,
}

impl StationSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationSourceKind::Simulated => "simulated",
            StationSourceKind::Http => "http",
        }
    }

    pub const fn all() -> &'static [StationSourceKind] {
        &[StationSourceKind::Simulated, StationSourceKind::Http]
    }
}

impl std::fmt::Display for StationSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for StationSourceKind {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "simulated" => Ok(StationSourceKind::Simulated),
            "http" => Ok(StationSourceKind::Http),
            _ => Err(anyhow!(
                "Unknown station source '{value}'. Supported sources: simulated, http."
            )),
        }
    }
}

/// Where station series come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub source: StationSourceKind,

    /// Example TOML:
    /// [station]
    /// source = "http"
    /// base_url = "https://hidro.example.org/api"
    pub base_url: String,

    pub timeout_secs: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            source: StationSourceKind::Simulated,
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 10,
        }
    }
}

impl StationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Municipality used when a command does not name one.
    pub default_municipality: Option<String>,

    /// Length of `chuva forecast` runs when `--days` is absent.
    pub forecast_days: u32,

    /// Fixed RNG seed; absent means fresh entropy on every run.
    pub seed: Option<u64>,

    pub station: StationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_municipality: None,
            forecast_days: 7,
            seed: None,
            station: StationConfig::default(),
        }
    }
}

impl Config {
    /// The configured default municipality, or Itirapina.
    pub fn default_municipality(&self) -> Result<&'static Municipality, ValidationError> {
        municipality::lookup(self.default_municipality.as_deref().unwrap_or(DEFAULT_MUNICIPALITY))
    }

    pub fn set_default_municipality(&mut self, name: &str) -> Result<(), ValidationError> {
        let m = municipality::lookup(name)?;
        self.default_municipality = Some(m.name.to_string());
        Ok(())
    }

    pub fn set_forecast_days(&mut self, days: u32) -> Result<(), ValidationError> {
        if days == 0 || days > MAX_FORECAST_DAYS {
            return Err(ValidationError::DayCount {
                value: days,
                max: MAX_FORECAST_DAYS,
            });
        }
        self.forecast_days = days;
        Ok(())
    }

    pub fn set_station_source(&mut self, source: StationSourceKind, base_url: Option<String>) {
        self.station.source = source;
        if let Some(url) = base_url {
            self.station.base_url = url;
        }
    }

    /// Load config from the platform location, or defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        if let Some(name) = &cfg.default_municipality {
            municipality::lookup(name)?;
        }
        Ok(cfg)
    }

    /// Save config to the platform location, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("br", "chuva", "chuva")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
