use std::path::Path;

use anyhow::{Context, Result};
use chuva_core::{Config, StationSourceKind, municipality::MUNICIPALITIES};
use inquire::{CustomType, Select, Text};

/// Everything `chuva configure` asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct Answers {
    pub municipality: String,
    pub forecast_days: u32,
    pub seed: Option<u64>,
    pub station_source: StationSourceKind,
    pub base_url: Option<String>,
}

pub fn apply(mut config: Config, answers: Answers) -> Result<Config> {
    config.set_default_municipality(&answers.municipality)?;
    config.set_forecast_days(answers.forecast_days)?;
    config.seed = answers.seed;
    config.set_station_source(answers.station_source, answers.base_url);
    Ok(config)
}

fn ask(config: &Config) -> Result<Answers> {
    let names: Vec<&str> = MUNICIPALITIES.iter().map(|m| m.name).collect();
    let current = config.default_municipality().map(|m| m.name).unwrap_or(names[0]);
    let cursor = names.iter().position(|n| *n == current).unwrap_or(0);

    let municipality = Select::new("Default municipality:", names)
        .with_starting_cursor(cursor)
        .prompt()
        .context("Municipality selection aborted")?
        .to_string();

    let forecast_days = CustomType::<u32>::new("Forecast length in days (1-30):")
        .with_default(config.forecast_days)
        .prompt()
        .context("Forecast length prompt aborted")?;

    let seed_text = Text::new("Fixed random seed (empty for none):")
        .with_default(&config.seed.map(|s| s.to_string()).unwrap_or_default())
        .prompt()
        .context("Seed prompt aborted")?;
    let seed = match seed_text.trim() {
        "" => None,
        s => Some(s.parse::<u64>().with_context(|| format!("Invalid seed '{s}'"))?),
    };

    let sources = StationSourceKind::all().to_vec();
    let source_cursor = sources.iter().position(|s| *s == config.station.source).unwrap_or(0);
    let station_source = Select::new("Station data source:", sources)
        .with_starting_cursor(source_cursor)
        .prompt()
        .context("Station source selection aborted")?;

    let base_url = if station_source == StationSourceKind::Http {
        Some(
            Text::new("Station service base URL:")
                .with_default(&config.station.base_url)
                .prompt()
                .context("Base URL prompt aborted")?,
        )
    } else {
        None
    };

    Ok(Answers {
        municipality,
        forecast_days,
        seed,
        station_source,
        base_url,
    })
}

/// Prompt for every setting and save to `path`, or the platform default.
pub fn run(config: Config, path: Option<&Path>) -> Result<()> {
    let answers = ask(&config)?;
    let config = apply(config, answers)?;

    let saved = match path {
        Some(p) => {
            config.save_to(p)?;
            p.to_path_buf()
        }
        None => config.save()?,
    };

    println!("Configuration saved to {}", saved.display());
    Ok(())
}
