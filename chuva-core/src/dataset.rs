//! CSV reading and writing for every table the CLI consumes or produces.

use std::io::{Read, Write};

use crate::{
    error::DatasetError,
    features::{self, ColumnMapping, FeatureRow, FeatureTable, RawTable},
    history::HistoryPoint,
    model::{ForecastSeries, WeatherSample},
    station::StationSeries,
};

/// Column appended to uploaded tables by `write_predictions`.
pub const PREDICTION_COLUMN: &str = "previsao_precipitacao";

pub fn read_table<R: Read>(reader: R) -> Result<RawTable, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    let mut lines = Vec::new();
    for record in rdr.records() {
        let record = record?;
        // blank lines and quoted newlines make this differ from the row index
        lines.push(record.position().map_or(rows.len() + 2, |p| p.line() as usize));
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable { headers, rows, lines })
}

/// Read and gap-fill samples, rejecting any that fail validation.
pub fn read_samples<R: Read>(reader: R, mapping: &ColumnMapping) -> Result<Vec<WeatherSample>, DatasetError> {
    let table = features::engineer(&read_table(reader)?, mapping)?;
    validate_rows(&table)?;
    Ok(table.rows.into_iter().map(|r| r.sample).collect())
}

/// First invalid row, by position in the source file.
pub fn validate_rows(table: &FeatureTable) -> Result<(), DatasetError> {
    let mut rows: Vec<&FeatureRow> = table.rows.iter().collect();
    rows.sort_by_key(|r| r.line);
    for row in rows {
        row.sample
            .validate()
            .map_err(|source| DatasetError::InvalidRow { line: row.line, source })?;
    }
    Ok(())
}

/// Echo the source columns of each row, plus the estimate.
pub fn write_predictions<W: Write>(
    writer: W,
    table: &FeatureTable,
    predictions: &[f64],
) -> Result<(), DatasetError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = table.source_headers.iter().map(String::as_str).collect();
    header.push(PREDICTION_COLUMN);
    wtr.write_record(&header)?;

    for (row, value) in table.rows.iter().zip(predictions) {
        let mut record = row.source.clone();
        record.resize(table.source_headers.len(), String::new());
        record.push(format!("{value:.2}"));
        wtr.write_record(&record)?;
    }

    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_features<W: Write>(writer: W, table: &FeatureTable) -> Result<(), DatasetError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(FeatureRow::HEADERS)?;
    for row in &table.rows {
        wtr.write_record(row.to_record())?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_series<W: Write>(writer: W, series: &ForecastSeries) -> Result<(), DatasetError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for point in &series.points {
        wtr.serialize(point)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_history<W: Write>(writer: W, points: &[HistoryPoint]) -> Result<(), DatasetError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for point in points {
        wtr.serialize(point)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_station<W: Write>(writer: W, series: &StationSeries) -> Result<(), DatasetError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["data", series.kind.as_str()])?;
    for reading in &series.readings {
        wtr.write_record([reading.date.format("%Y-%m-%d").to_string(), format!("{:.2}", reading.value)])?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::ForecastPoint, station::{DataKind, StationReading}};
    use chrono::NaiveDate;

    const UPLOAD: &str = "\
data,temp_max,temp_min,umidade,pressao,vel_vento,rad_solar,estacao
2024-01-02,31.0,20.5,82,1009,2.5,17,A
2024-01-01,29.0,19.0,,1011,3.0,21,A
2024-01-03,30.0,21.0,77,1010,1.0,19,A
";

    #[test]
    fn read_table_keeps_all_columns() {
        let table = read_table(UPLOAD.as_bytes()).unwrap();
        assert_eq!(table.headers.len(), 8);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1][3], "");
    }

    #[test]
    fn read_samples_fills_and_sorts() {
        let samples = read_samples(UPLOAD.as_bytes(), &ColumnMapping::default()).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(samples[0].humidity, 82.0);
    }

    #[test]
    fn read_samples_reports_invalid_line() {
        let csv = "\
data,temp_max,temp_min,umidade,pressao,vel_vento,rad_solar
2024-01-01,29.0,19.0,80,1011,3.0,21
2024-01-02,20.0,25.0,80,1011,3.0,21
";
        let err = read_samples(csv.as_bytes(), &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidRow { line: 3, .. }));
        assert!(err.to_string().starts_with("row 3:"));
    }

    #[test]
    fn invalid_line_counts_blank_lines_and_multiline_cells() {
        let csv = "\
data,temp_max,temp_min,umidade,pressao,vel_vento,rad_solar,obs
2024-01-01,29.0,19.0,80,1011,3.0,21,\"linha um
linha dois\"

2024-01-02,20.0,25.0,80,1011,3.0,21,ok
";
        let table = read_table(csv.as_bytes()).unwrap();
        assert_eq!(table.lines, vec![2, 5]);

        let err = read_samples(csv.as_bytes(), &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidRow { line: 5, .. }), "{err}");
    }

    #[test]
    fn missing_columns_error_names_them() {
        let err = read_samples("data,temp_max\n2024-01-01,30\n".as_bytes(), &ColumnMapping::default())
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("missing required columns"));
        assert!(msg.contains("rad_solar"));
    }

    #[test]
    fn predictions_echo_source_columns() {
        let table = features::engineer(&read_table(UPLOAD.as_bytes()).unwrap(), &ColumnMapping::default())
            .unwrap();
        let mut out = Vec::new();
        write_predictions(&mut out, &table, &[1.0, 2.345, 0.0]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "data,temp_max,temp_min,umidade,pressao,vel_vento,rad_solar,estacao,previsao_precipitacao"
        );
        // rows come out in date order, original cells untouched
        assert_eq!(lines[1], "2024-01-01,29.0,19.0,,1011,3.0,21,A,1.00");
        assert!(lines[2].ends_with(",2.35") || lines[2].ends_with(",2.34"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn features_csv_has_fixed_header() {
        let table = features::engineer(&read_table(UPLOAD.as_bytes()).unwrap(), &ColumnMapping::default())
            .unwrap();
        let mut out = Vec::new();
        write_features(&mut out, &table).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("data,temp_max,temp_min,umidade"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn series_csv() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = ForecastSeries {
            location: "Natal/RN".into(),
            points: vec![ForecastPoint { date: d, precipitation_mm: 3.5 }],
        };
        let mut out = Vec::new();
        write_series(&mut out, &series).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "data,precipitacao_mm\n2024-01-01,3.5\n");
    }

    #[test]
    fn station_csv_uses_kind_as_header() {
        let series = StationSeries {
            code: "35520000".into(),
            kind: DataKind::Nivel,
            readings: vec![StationReading {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                value: 5.1,
            }],
        };
        let mut out = Vec::new();
        write_station(&mut out, &series).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "data,nivel\n2024-01-01,5.10\n");
    }
}
