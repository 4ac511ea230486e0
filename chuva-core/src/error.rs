use thiserror::Error;

/// Rejected user input (CSV rows, forecast parameters, lookups).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} = {value} is outside the allowed range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("temp_min ({min}) must be lower than temp_max ({max})")]
    MinNotBelowMax { min: f64, max: f64 },

    #[error("Unknown municipality '{0}'. Run `chuva map` to list supported municipalities.")]
    UnknownMunicipality(String),

    #[error("day count must be between 1 and {max}, got {value}")]
    DayCount { value: u32, max: u32 },
}

/// Failures while reading or reshaping a CSV dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column '{0}' has no numeric values to fill gaps from")]
    EmptyColumn(&'static str),

    #[error("invalid column mapping '{0}', expected `source=target`")]
    BadMapping(String),

    #[error("unknown target column '{0}' in mapping")]
    UnknownTarget(String),

    #[error("row {line}: {source}")]
    InvalidRow {
        line: usize,
        #[source]
        source: ValidationError,
    },

    #[error("failed to read CSV")]
    Csv(#[from] csv::Error),
}

/// Failures while fetching hydrological station data.
#[derive(Debug, Error)]
pub enum StationError {
    #[error("Unknown data kind '{0}'. Use 'precipitacao', 'nivel' or 'descarga'.")]
    UnknownKind(String),

    #[error("request to station service failed")]
    Http(#[from] reqwest::Error),

    #[error("invalid station service URL '{url}': {message}")]
    BadUrl { url: String, message: String },

    #[error("station service answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not parse station service response: {message}: {body}")]
    Parse { message: String, body: String },

    #[error("day count must be between 1 and {max}, got {value}")]
    DayCount { value: u32, max: u32 },
}
