//! Feature engineering over uploaded weather tables.
//!
//! Columns are renamed through a [`ColumnMapping`], rows with unusable dates
//! are dropped, numeric gaps are filled forward then backward, and calendar,
//! rolling-window and cyclic columns are added. The output never contains
//! `NaN` in a numeric column.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::{error::DatasetError, model::WeatherSample};

/// Canonical columns of the weather schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    TempMax,
    TempMin,
    Humidity,
    Pressure,
    WindSpeed,
    SolarRadiation,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Date,
        Field::TempMax,
        Field::TempMin,
        Field::Humidity,
        Field::Pressure,
        Field::WindSpeed,
        Field::SolarRadiation,
    ];

    pub const NUMERIC: [Field; 6] = [
        Field::TempMax,
        Field::TempMin,
        Field::Humidity,
        Field::Pressure,
        Field::WindSpeed,
        Field::SolarRadiation,
    ];

    /// Column name in the upload schema.
    pub fn column(&self) -> &'static str {
        match self {
            Field::Date => "data",
            Field::TempMax => "temp_max",
            Field::TempMin => "temp_min",
            Field::Humidity => "umidade",
            Field::Pressure => "pressao",
            Field::WindSpeed => "vel_vento",
            Field::SolarRadiation => "rad_solar",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::Date => &["date", "dia"],
            Field::TempMax => &["tmax", "max_temp"],
            Field::TempMin => &["tmin", "min_temp"],
            Field::Humidity => &["humidity", "umidade_relativa"],
            Field::Pressure => &["pressure", "pressao_atm"],
            Field::WindSpeed => &["wind_speed", "vento"],
            Field::SolarRadiation => &["solar_radiation", "radiacao"],
        }
    }

    pub fn from_column(name: &str) -> Option<Field> {
        let name = name.trim().to_lowercase();
        Field::ALL
            .into_iter()
            .find(|f| f.column() == name || f.aliases().contains(&name.as_str()))
    }
}

/// Source header to canonical column renames, applied before alias matching.
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    renames: Vec<(String, Field)>,
}

impl ColumnMapping {
    pub fn rename(mut self, source: impl Into<String>, target: Field) -> Self {
        self.renames.push((source.into().trim().to_lowercase(), target));
        self
    }

    /// Parse `source=target` pairs as given on the command line.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self, DatasetError> {
        let mut mapping = Self::default();
        for pair in pairs {
            let pair = pair.as_ref();
            let (source, target) = pair
                .split_once('=')
                .filter(|(s, t)| !s.trim().is_empty() && !t.trim().is_empty())
                .ok_or_else(|| DatasetError::BadMapping(pair.to_string()))?;
            let field = Field::from_column(target)
                .ok_or_else(|| DatasetError::UnknownTarget(target.trim().to_string()))?;
            mapping = mapping.rename(source, field);
        }
        Ok(mapping)
    }

    fn renamed(&self, header: &str) -> Option<Field> {
        let header = header.trim().to_lowercase();
        self.renames
            .iter()
            .find(|(source, _)| *source == header)
            .map(|(_, field)| *field)
    }

    /// Column index for every canonical field, in [`Field::ALL`] order.
    ///
    /// Explicit renames claim their field first. Native names and aliases
    /// only fill fields no rename targets, and a renamed column is never
    /// matched again by its own name.
    pub fn resolve(&self, headers: &[String]) -> Result<[usize; 7], DatasetError> {
        let mut found: [Option<usize>; 7] = [None; 7];
        for (idx, header) in headers.iter().enumerate() {
            if let Some(field) = self.renamed(header) {
                found[field_index(field)].get_or_insert(idx);
            }
        }
        for (idx, header) in headers.iter().enumerate() {
            if self.renamed(header).is_some() {
                continue;
            }
            if let Some(field) = Field::from_column(header) {
                found[field_index(field)].get_or_insert(idx);
            }
        }

        let missing: Vec<String> = Field::ALL
            .iter()
            .zip(found.iter())
            .filter(|(_, idx)| idx.is_none())
            .map(|(field, _)| field.column().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DatasetError::MissingColumns(missing));
        }

        Ok(found.map(|idx| idx.unwrap_or_default()))
    }
}

fn field_index(field: Field) -> usize {
    Field::ALL
        .iter()
        .position(|f| *f == field)
        .unwrap_or_default()
}

/// A CSV table as read, before any typing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 1-based source line where each row starts. When absent, rows are
    /// assumed to follow the header one per line.
    pub lines: Vec<usize>,
}

/// One engineered row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// 1-based line in the source file, header included.
    pub line: usize,
    /// Original cells, kept so outputs can echo the input columns.
    pub source: Vec<String>,
    pub sample: WeatherSample,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub day_of_year: u32,
    /// Monday = 0.
    pub weekday: u32,
    pub temp_mean: f64,
    pub temp_range: f64,
    pub humidity_ma3: f64,
    pub humidity_ma7: f64,
    pub pressure_ma3: f64,
    pub temp_mean_ma7: f64,
    pub solar_ma3: f64,
    pub month_sin: f64,
    pub month_cos: f64,
    pub doy_sin: f64,
    pub doy_cos: f64,
}

impl FeatureRow {
    pub const HEADERS: [&'static str; 24] = [
        "data",
        "temp_max",
        "temp_min",
        "umidade",
        "pressao",
        "vel_vento",
        "rad_solar",
        "ano",
        "mes",
        "dia",
        "dia_do_ano",
        "dia_da_semana",
        "temp_media",
        "amplitude_termica",
        "umidade_mm3",
        "umidade_mm7",
        "pressao_mm3",
        "temp_media_mm7",
        "rad_solar_mm3",
        "mes_sin",
        "mes_cos",
        "dia_ano_sin",
        "dia_ano_cos",
        "linha",
    ];

    /// Features of a lone sample: rolling windows collapse to the sample itself.
    pub fn from_sample(sample: WeatherSample) -> Self {
        let temp_mean = sample.temp_mean();
        Self::build(
            0,
            Vec::new(),
            sample.clone(),
            Rolling {
                humidity_ma3: sample.humidity,
                humidity_ma7: sample.humidity,
                pressure_ma3: sample.pressure,
                temp_mean_ma7: temp_mean,
                solar_ma3: sample.solar_radiation,
            },
        )
    }

    fn build(line: usize, source: Vec<String>, sample: WeatherSample, rolling: Rolling) -> Self {
        let date = sample.date;
        let month = date.month();
        let day_of_year = date.ordinal();
        let month_angle = 2.0 * PI * f64::from(month) / 12.0;
        let doy_angle = 2.0 * PI * f64::from(day_of_year) / 365.25;

        Self {
            line,
            source,
            year: date.year(),
            month,
            day: date.day(),
            day_of_year,
            weekday: date.weekday().num_days_from_monday(),
            temp_mean: sample.temp_mean(),
            temp_range: sample.temp_max - sample.temp_min,
            humidity_ma3: rolling.humidity_ma3,
            humidity_ma7: rolling.humidity_ma7,
            pressure_ma3: rolling.pressure_ma3,
            temp_mean_ma7: rolling.temp_mean_ma7,
            solar_ma3: rolling.solar_ma3,
            month_sin: month_angle.sin(),
            month_cos: month_angle.cos(),
            doy_sin: doy_angle.sin(),
            doy_cos: doy_angle.cos(),
            sample,
        }
    }

    pub fn to_record(&self) -> Vec<String> {
        let s = &self.sample;
        let numbers = [
            s.temp_max,
            s.temp_min,
            s.humidity,
            s.pressure,
            s.wind_speed,
            s.solar_radiation,
        ];
        let derived = [
            self.temp_mean,
            self.temp_range,
            self.humidity_ma3,
            self.humidity_ma7,
            self.pressure_ma3,
            self.temp_mean_ma7,
            self.solar_ma3,
            self.month_sin,
            self.month_cos,
            self.doy_sin,
            self.doy_cos,
        ];

        let mut record = Vec::with_capacity(Self::HEADERS.len());
        record.push(s.date.format("%Y-%m-%d").to_string());
        record.extend(numbers.iter().map(|v| v.to_string()));
        record.push(self.year.to_string());
        record.push(self.month.to_string());
        record.push(self.day.to_string());
        record.push(self.day_of_year.to_string());
        record.push(self.weekday.to_string());
        record.extend(derived.iter().map(|v| format!("{v:.4}")));
        record.push(self.line.to_string());
        record
    }
}

struct Rolling {
    humidity_ma3: f64,
    humidity_ma7: f64,
    pressure_ma3: f64,
    temp_mean_ma7: f64,
    solar_ma3: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    /// Headers of the source table, in source order.
    pub source_headers: Vec<String>,
    pub rows: Vec<FeatureRow>,
    /// Lines dropped because their date could not be parsed.
    pub dropped_lines: Vec<usize>,
}

impl FeatureTable {
    pub fn samples(&self) -> impl Iterator<Item = &WeatherSample> {
        self.rows.iter().map(|r| &r.sample)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

struct Parsed {
    line: usize,
    source: Vec<String>,
    date: NaiveDate,
    values: [Option<f64>; 6],
}

/// Rename, type, gap-fill and enrich a raw table.
pub fn engineer(table: &RawTable, mapping: &ColumnMapping) -> Result<FeatureTable, DatasetError> {
    let idx = mapping.resolve(&table.headers)?;
    let date_idx = idx[field_index(Field::Date)];

    let mut parsed = Vec::with_capacity(table.rows.len());
    let mut dropped_lines = Vec::new();

    for (n, row) in table.rows.iter().enumerate() {
        let line = table.lines.get(n).copied().unwrap_or(n + 2);
        let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");

        let Some(date) = parse_date(cell(date_idx)) else {
            warn!(line, value = cell(date_idx), "dropping row with malformed date");
            dropped_lines.push(line);
            continue;
        };

        let mut values = [None; 6];
        for (slot, field) in values.iter_mut().zip(Field::NUMERIC) {
            *slot = parse_number(cell(idx[field_index(field)]));
        }

        parsed.push(Parsed {
            line,
            source: row.clone(),
            date,
            values,
        });
    }

    parsed.sort_by_key(|p| p.date);

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(6);
    for (i, field) in Field::NUMERIC.iter().enumerate() {
        let raw: Vec<Option<f64>> = parsed.iter().map(|p| p.values[i]).collect();
        if raw.is_empty() {
            columns.push(Vec::new());
            continue;
        }
        let filled = fill_gaps(&raw).ok_or(DatasetError::EmptyColumn(field.column()))?;
        columns.push(filled);
    }

    let samples: Vec<WeatherSample> = parsed
        .iter()
        .enumerate()
        .map(|(i, p)| WeatherSample {
            date: p.date,
            temp_max: columns[0][i],
            temp_min: columns[1][i],
            humidity: columns[2][i],
            pressure: columns[3][i],
            wind_speed: columns[4][i],
            solar_radiation: columns[5][i],
        })
        .collect();

    let temp_means: Vec<f64> = samples.iter().map(WeatherSample::temp_mean).collect();
    let humidity_ma3 = rolling_mean(&columns[2], 3);
    let humidity_ma7 = rolling_mean(&columns[2], 7);
    let pressure_ma3 = rolling_mean(&columns[3], 3);
    let temp_mean_ma7 = rolling_mean(&temp_means, 7);
    let solar_ma3 = rolling_mean(&columns[5], 3);

    let rows: Vec<FeatureRow> = parsed
        .into_iter()
        .zip(samples)
        .enumerate()
        .map(|(i, (p, sample))| {
            FeatureRow::build(
                p.line,
                p.source,
                sample,
                Rolling {
                    humidity_ma3: humidity_ma3[i],
                    humidity_ma7: humidity_ma7[i],
                    pressure_ma3: pressure_ma3[i],
                    temp_mean_ma7: temp_mean_ma7[i],
                    solar_ma3: solar_ma3[i],
                },
            )
        })
        .collect();

    debug!(rows = rows.len(), dropped = dropped_lines.len(), "feature engineering done");

    Ok(FeatureTable {
        source_headers: table.headers.clone(),
        rows,
        dropped_lines,
    })
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Accepts a decimal comma; empty and non-finite cells are gaps.
fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Forward fill, then backward fill the leading gap. `None` if nothing to fill from.
pub fn fill_gaps(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let first = values.iter().flatten().copied().next()?;
    let mut last = first;
    Some(
        values
            .iter()
            .map(|v| {
                if let Some(v) = v {
                    last = *v;
                }
                last
            })
            .collect(),
    )
}

/// Trailing mean over `window` values, with a minimum of one period.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}
