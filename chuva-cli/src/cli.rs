use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use chuva_core::{
    ColumnMapping, Config, DataKind, ForecastInput, RainEstimator, dataset, features,
    history::{self, HistoryPoint},
    metrics::ModelMetrics,
    municipality::{self, MUNICIPALITIES},
    station::{self, StationSeries},
};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, warn};

use crate::{configure, render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "chuva",
    version,
    about = "Daily rainfall estimates for Brazilian municipalities",
    long_about = "Daily rainfall estimates for Brazilian municipalities.\n\n\
                  Estimates come from a closed-form heuristic with random noise, not from a trained model."
)]
pub struct Cli {
    /// Read configuration from this file instead of the platform default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Seed for every random draw, overriding the configured seed.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Estimated precipitation per state and per municipality.
    Map {
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Write a simulated observed-vs-estimated history for a municipality.
    History {
        /// Municipality name, e.g. "Itirapina" or "sao paulo".
        municipio: String,

        #[arg(long, default_value_t = 30)]
        days: u32,

        /// Output CSV; defaults to `<municipio>_previsao_historica.csv`. Use `-` for stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Estimate precipitation for every row of a weather CSV.
    Predict {
        /// CSV with columns data, temp_max, temp_min, umidade, pressao, vel_vento, rad_solar.
        input: PathBuf,

        /// Output CSV; use `-` for stdout.
        #[arg(short, long, default_value = "previsoes_clima.csv")]
        output: PathBuf,

        /// Rename a source column, e.g. `--map hum=umidade`.
        #[arg(long = "map", value_name = "SOURCE=TARGET")]
        mappings: Vec<String>,

        /// Apply this municipality's factor to every estimate.
        #[arg(long)]
        municipio: Option<String>,
    },

    /// Add calendar, rolling-window and cyclic columns to a weather CSV.
    Features {
        input: PathBuf,

        /// Output CSV; stdout when absent.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long = "map", value_name = "SOURCE=TARGET")]
        mappings: Vec<String>,
    },

    /// Daily series from one set of weather conditions.
    Forecast {
        #[arg(long)]
        municipio: Option<String>,

        /// Number of days, 1 to 30; defaults to the configured value.
        #[arg(long)]
        days: Option<u32>,

        /// First day, YYYY-MM-DD; defaults to today.
        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long, allow_negative_numbers = true)]
        temp_max: Option<f64>,

        #[arg(long, allow_negative_numbers = true)]
        temp_min: Option<f64>,

        /// Relative humidity, %.
        #[arg(long)]
        humidity: Option<f64>,

        /// Pressure, hPa.
        #[arg(long)]
        pressure: Option<f64>,

        /// Wind speed, m/s.
        #[arg(long)]
        wind_speed: Option<f64>,

        /// Solar radiation, MJ/m².
        #[arg(long)]
        solar_radiation: Option<f64>,

        /// Also write the series as CSV.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List known ANA stations.
    Stations,

    /// Fetch a daily series for an ANA station.
    Station {
        /// Station code, e.g. 35520000.
        code: String,

        #[arg(long, default_value_t = 30)]
        days: u32,

        /// precipitacao, nivel or descarga; defaults to the catalog entry.
        #[arg(long)]
        kind: Option<DataKind>,

        /// Output CSV; use `-` for stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// What this tool does, its reference metrics and a simulated comparison.
    About,

    /// Interactively edit the configuration file.
    Configure,
}

/// Resolved per-run state shared by the commands.
struct RunContext {
    config: Config,
    seed: Option<u64>,
    rng: StdRng,
    estimator: RainEstimator,
    today: NaiveDate,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };

        let seed = self.seed.or(config.seed);
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        debug!(?seed, "random generator ready");

        let mut ctx = RunContext {
            config,
            seed,
            rng,
            estimator: RainEstimator::default(),
            today: Local::now().date_naive(),
        };

        match self.command {
            Command::Map { format } => map(&mut ctx, format),
            Command::History { municipio, days, output } => history(&mut ctx, &municipio, days, output),
            Command::Predict {
                input,
                output,
                mappings,
                municipio,
            } => predict(&mut ctx, &input, &output, &mappings, municipio.as_deref()),
            Command::Features { input, output, mappings } => features(&input, output.as_deref(), &mappings),
            Command::Forecast {
                municipio,
                days,
                start,
                temp_max,
                temp_min,
                humidity,
                pressure,
                wind_speed,
                solar_radiation,
                output,
            } => {
                let mut input = ForecastInput::typical(start.unwrap_or(ctx.today));
                input.days = days.unwrap_or(ctx.config.forecast_days);
                input.temp_max = temp_max.unwrap_or(input.temp_max);
                input.temp_min = temp_min.unwrap_or(input.temp_min);
                input.humidity = humidity.unwrap_or(input.humidity);
                input.pressure = pressure.unwrap_or(input.pressure);
                input.wind_speed = wind_speed.unwrap_or(input.wind_speed);
                input.solar_radiation = solar_radiation.unwrap_or(input.solar_radiation);
                forecast(&mut ctx, municipio.as_deref(), &input, output.as_deref())
            }
            Command::Stations => {
                print!("{}", render::stations(&station::catalog()));
                Ok(())
            }
            Command::Station {
                code,
                days,
                kind,
                output,
            } => station(&ctx, &code, days, kind, output.as_deref()).await,
            Command::About => about(&mut ctx),
            Command::Configure => configure::run(ctx.config, self.config.as_deref()),
        }
    }
}

fn map(ctx: &mut RunContext, format: Format) -> Result<()> {
    let states = history::simulate_state_map(&mut ctx.rng);

    let input = ForecastInput {
        days: 1,
        ..ForecastInput::typical(ctx.today)
    };
    let mut municipalities = Vec::with_capacity(MUNICIPALITIES.len());
    for m in &MUNICIPALITIES {
        let series = ctx.estimator.forecast(&input, m, &mut ctx.rng)?;
        municipalities.push(render::MunicipalityEstimate {
            municipality: *m,
            precipitation_mm: series.total_mm(),
        });
    }

    let report = render::MapReport {
        date: ctx.today,
        states,
        municipalities,
    };

    match format {
        Format::Table => print!("{}", render::map(&report)),
        Format::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize map report")?
        ),
    }
    Ok(())
}

fn history(ctx: &mut RunContext, name: &str, days: u32, output: Option<PathBuf>) -> Result<()> {
    let m = municipality::lookup(name)?;
    let points: Vec<HistoryPoint> =
        history::simulate_municipality(m.name, days, ctx.today, &mut ctx.rng).context("Invalid --days")?;

    let path = output.unwrap_or_else(|| PathBuf::from(format!("{}_previsao_historica.csv", m.name)));
    with_output(Some(&path), |w| dataset::write_history(w, &points).map_err(Into::into))?;

    if !is_stdout(Some(&path)) {
        println!(
            "Wrote {} days of simulated history for {}/{} to {}",
            points.len(),
            m.name,
            m.state,
            path.display()
        );
    }
    Ok(())
}

fn predict(
    ctx: &mut RunContext,
    input: &Path,
    output: &Path,
    mappings: &[String],
    municipio: Option<&str>,
) -> Result<()> {
    let mapping = ColumnMapping::from_pairs(mappings)?;
    let factor = match municipio {
        Some(name) => municipality::lookup(name)?.factor,
        None => 1.0,
    };

    let table = read_features(input, &mapping)?;
    dataset::validate_rows(&table).with_context(|| format!("Invalid data in {}", input.display()))?;

    let predictions = ctx.estimator.batch(&table, factor, &mut ctx.rng);
    with_output(Some(output), |w| {
        dataset::write_predictions(w, &table, &predictions).map_err(Into::into)
    })?;

    if !is_stdout(Some(output)) {
        print!("{}", render::predictions_preview(&table, &predictions, 5));
        println!("Wrote {} estimates to {}", predictions.len(), output.display());
    }
    Ok(())
}

fn features(input: &Path, output: Option<&Path>, mappings: &[String]) -> Result<()> {
    let mapping = ColumnMapping::from_pairs(mappings)?;
    let table = read_features(input, &mapping)?;
    with_output(output, |w| dataset::write_features(w, &table).map_err(Into::into))
}

fn forecast(ctx: &mut RunContext, municipio: Option<&str>, input: &ForecastInput, output: Option<&Path>) -> Result<()> {
    let m = match municipio {
        Some(name) => municipality::lookup(name)?,
        None => ctx.config.default_municipality()?,
    };

    let series = ctx.estimator.forecast(input, m, &mut ctx.rng)?;
    print!("{}", render::forecast(&series));

    if let Some(path) = output {
        with_output(Some(path), |w| dataset::write_series(w, &series).map_err(Into::into))?;
    }
    Ok(())
}

async fn station(ctx: &RunContext, code: &str, days: u32, kind: Option<DataKind>, output: Option<&Path>) -> Result<()> {
    let info = station::find_station(code);
    let kind = kind.or(info.as_ref().map(|s| s.kind)).unwrap_or(DataKind::Precipitacao);
    if info.is_none() {
        warn!(code, "station is not in the catalog");
    }

    let series: StationSeries = station::fetch_with_fallback(&ctx.config.station, ctx.seed, code, days, kind)
        .await
        .with_context(|| format!("Failed to fetch station {code}"))?;

    match output {
        Some(path) => {
            with_output(Some(path), |w| dataset::write_station(w, &series).map_err(Into::into))?;
            if !is_stdout(Some(path)) {
                println!("Wrote {} readings to {}", series.readings.len(), path.display());
            }
        }
        None => print!("{}", render::station(&series, info.as_ref())),
    }
    Ok(())
}

fn about(ctx: &mut RunContext) -> Result<()> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(ctx.today);
    let comparison = history::simulate_comparison(30, start, &mut ctx.rng);
    let computed = history::evaluate(&comparison)?;

    print!("{}", render::about(&ModelMetrics::REFERENCE, &computed, &comparison));
    Ok(())
}

fn read_features(input: &Path, mapping: &ColumnMapping) -> Result<chuva_core::FeatureTable> {
    let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let raw = dataset::read_table(BufReader::new(file))
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let table = features::engineer(&raw, mapping)
        .with_context(|| format!("Failed to process {}", input.display()))?;

    if !table.dropped_lines.is_empty() {
        warn!(
            dropped = table.dropped_lines.len(),
            "rows with malformed dates were skipped"
        );
    }
    if table.is_empty() {
        bail!("{} has no usable rows", input.display());
    }
    Ok(table)
}

fn is_stdout(path: Option<&Path>) -> bool {
    path.is_none_or(|p| p.as_os_str() == "-")
}

fn with_output<F>(path: Option<&Path>, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    match path {
        Some(p) if !is_stdout(Some(p)) => {
            let file = File::create(p).with_context(|| format!("Failed to create {}", p.display()))?;
            let mut w = BufWriter::new(file);
            write(&mut w)?;
            w.flush().with_context(|| format!("Failed to write {}", p.display()))
        }
        _ => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write(&mut lock)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_forecast_sliders() {
        let cli = Cli::try_parse_from([
            "chuva", "--seed", "7", "forecast", "--municipio", "Manaus", "--days", "10", "--temp-min", "-2",
            "--humidity", "90",
        ])
        .unwrap();

        assert_eq!(cli.seed, Some(7));
        match cli.command {
            Command::Forecast {
                municipio,
                days,
                temp_min,
                humidity,
                temp_max,
                ..
            } => {
                assert_eq!(municipio.as_deref(), Some("Manaus"));
                assert_eq!(days, Some(10));
                assert_eq!(temp_min, Some(-2.0));
                assert_eq!(humidity, Some(90.0));
                assert_eq!(temp_max, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_predict_with_mappings() {
        let cli = Cli::try_parse_from([
            "chuva", "predict", "dados.csv", "--map", "hum=umidade", "--map", "date=data", "-v",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Predict { input, output, mappings, .. } => {
                assert_eq!(input, PathBuf::from("dados.csv"));
                assert_eq!(output, PathBuf::from("previsoes_clima.csv"));
                assert_eq!(mappings, vec!["hum=umidade", "date=data"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn station_kind_is_validated() {
        assert!(Cli::try_parse_from(["chuva", "station", "35520000", "--kind", "nivel"]).is_ok());
        assert!(Cli::try_parse_from(["chuva", "station", "35520000", "--kind", "temperatura"]).is_err());
    }

    fn context() -> RunContext {
        RunContext {
            config: Config::default(),
            seed: Some(1),
            rng: StdRng::seed_from_u64(1),
            estimator: RainEstimator::default(),
            today: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
        }
    }

    #[test]
    fn history_rejects_huge_day_counts_before_simulating() {
        let mut ctx = context();
        let err = history(&mut ctx, "Itirapina", u32::MAX, Some(PathBuf::from("-"))).unwrap_err();
        assert!(format!("{err:#}").contains("day count must be between 1 and"), "{err:#}");

        assert!(history(&mut ctx, "Itirapina", 0, Some(PathBuf::from("-"))).is_err());
    }

    #[tokio::test]
    async fn station_rejects_huge_day_counts() {
        let ctx = context();
        let err = station(&ctx, "35520000", u32::MAX, None, Some(Path::new("-")))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("day count must be between 1 and"), "{err:#}");
    }

    #[test]
    fn dash_means_stdout() {
        assert!(is_stdout(None));
        assert!(is_stdout(Some(Path::new("-"))));
        assert!(!is_stdout(Some(Path::new("out.csv"))));
    }
}
