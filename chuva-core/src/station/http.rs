use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{error::StationError, features::parse_date, model::round2};

use super::{DataKind, StationReading, StationSeries, StationSource};

/// Fetches station series from an HTTP service. One attempt, no retry.
#[derive(Debug, Clone)]
pub struct HttpStation {
    base_url: Url,
    http: Client,
}

impl HttpStation {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StationError> {
        let bad_url = |message: String| StationError::BadUrl {
            url: base_url.to_string(),
            message,
        };

        let base = Url::parse(base_url.trim()).map_err(|e| bad_url(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(bad_url("URL cannot have path segments".into()));
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self { base_url: base, http })
    }

    /// `{base}/estacoes/{code}/{kind}`, with the code percent-encoded as a
    /// single path segment.
    pub fn url(&self, code: &str, kind: DataKind) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base URLs are rejected in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["estacoes", code.trim(), kind.as_str()]);
        }
        url
    }
}

#[derive(Debug, Deserialize)]
struct HttpReading {
    data: String,
    valor: Option<f64>,
}

/// Best-effort parse: rows with an unreadable date or a null value are skipped.
pub fn parse_body(body: &str) -> Result<Vec<StationReading>, StationError> {
    let rows: Vec<HttpReading> = serde_json::from_str(body).map_err(|e| StationError::Parse {
        message: e.to_string(),
        body: truncate_body(body),
    })?;

    let total = rows.len();
    let mut readings: Vec<StationReading> = rows
        .into_iter()
        .filter_map(|row| {
            let date = parse_date(&row.data)?;
            let value = row.valor.filter(|v| v.is_finite())?;
            Some(StationReading {
                date,
                value: round2(value),
            })
        })
        .collect();
    readings.sort_by_key(|r| r.date);

    if readings.len() < total {
        debug!(skipped = total - readings.len(), "skipped unusable station rows");
    }

    Ok(readings)
}

#[async_trait]
impl StationSource for HttpStation {
    async fn fetch(&self, code: &str, days: u32, kind: DataKind) -> Result<StationSeries, StationError> {
        super::check_days(days)?;

        let url = self.url(code, kind);
        info!(%url, days, "requesting station data");

        let res = self
            .http
            .get(url)
            .query(&[("dias", days.to_string())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(StationError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let mut readings = parse_body(&body)?;
        let keep = days as usize;
        if readings.len() > keep {
            readings.drain(..readings.len() - keep);
        }

        Ok(StationSeries {
            code: code.trim().to_string(),
            kind,
            readings,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn station(base: &str) -> HttpStation {
        HttpStation::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn url_joins_base_code_and_kind() {
        assert_eq!(
            station("https://example.org/api/").url(" 35520000 ", DataKind::Descarga).as_str(),
            "https://example.org/api/estacoes/35520000/descarga"
        );
        assert_eq!(
            station("http://localhost:8080").url("35520000", DataKind::Nivel).as_str(),
            "http://localhost:8080/estacoes/35520000/nivel"
        );
    }

    #[test]
    fn code_cannot_escape_its_path_segment() {
        let url = station("https://example.org/api").url("../x?dias=9#f", DataKind::Nivel);
        assert_eq!(url.path_segments().map(|s| s.count()), Some(4));
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert!(url.as_str().ends_with("/estacoes/..%2Fx%3Fdias=9%23f/nivel"), "{url}");
    }

    #[test]
    fn rejects_unusable_base_urls() {
        for base in ["", "example.org/api", "mailto:ana@example.org"] {
            let err = HttpStation::new(base, Duration::from_secs(1)).unwrap_err();
            assert!(matches!(err, StationError::BadUrl { .. }), "{base}: {err}");
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_an_http_error() {
        let source = HttpStation::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let err = source.fetch("35520000", 5, DataKind::Precipitacao).await.unwrap_err();
        assert!(matches!(err, StationError::Http(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn day_count_is_checked_before_requesting() {
        let source = HttpStation::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let err = source.fetch("35520000", 0, DataKind::Nivel).await.unwrap_err();
        assert!(matches!(err, StationError::DayCount { value: 0, .. }));
    }

    #[test]
    fn parse_body_skips_nulls_and_bad_dates_and_sorts() {
        let body = r#"[
            {"data": "2024-02-02", "valor": 4.567},
            {"data": "2024-02-01", "valor": 1.0},
            {"data": "amanhã", "valor": 3.0},
            {"data": "2024-02-03", "valor": null}
        ]"#;
        let readings = parse_body(body).unwrap();
        assert_eq!(
            readings,
            vec![
                StationReading { date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), value: 1.0 },
                StationReading { date: NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(), value: 4.57 },
            ]
        );
    }

    #[test]
    fn parse_body_reports_truncated_body() {
        let body = "<html>".repeat(100);
        let err = parse_body(&body).unwrap_err();
        match err {
            StationError::Parse { body, .. } => {
                assert!(body.ends_with("..."));
                assert_eq!(body.chars().count(), 203);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "ç".repeat(300);
        let short = truncate_body(&body);
        assert_eq!(short.chars().count(), 203);
    }
}
