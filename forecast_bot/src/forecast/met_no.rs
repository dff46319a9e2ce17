use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{ForecastError, ForecastProvider, Sample};
use crate::types::Coordinates;

/// Locationforecast 2.0 client. See <https://api.met.no/weatherapi/locationforecast/2.0/documentation>.
#[derive(Debug, Clone)]
pub struct MetNoProvider {
    http: Client,
    api_url: Url,
}

impl MetNoProvider {
    /// # Errors
    /// Errors if the HTTP client fails to build, e.g. the user agent is not a valid header value.
    pub fn new(api_url: Url, user_agent: &str) -> Result<Self, ForecastError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { http, api_url })
    }
}

#[async_trait]
impl ForecastProvider for MetNoProvider {
    fn attribution(&self) -> &'static str {
        "MET Norway (yr.no)"
    }

    async fn fetch(&self, coordinates: Coordinates) -> Result<Vec<Sample>, ForecastError> {
        // The API asks for no more than 4 decimals, to make its caching work.
        let lat = format!("{:.4}", coordinates.latitude());
        let lon = format!("{:.4}", coordinates.longitude());

        let res = self
            .http
            .get(self.api_url.clone())
            .query(&[("lat", lat.as_str()), ("lon", lon.as_str())])
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(ForecastError::Status {
                status,
                body: truncate_body(&body),
            });
        }
        if status == StatusCode::NON_AUTHORITATIVE_INFORMATION {
            log::warn!("MET Norway says this API version is deprecated!");
        }

        let samples = parse_timeseries(&body)?;
        log::debug!("Got {} forecast samples for {coordinates}", samples.len());
        Ok(samples)
    }
}

#[derive(Debug, Deserialize)]
struct MetResponse {
    properties: MetProperties,
}

#[derive(Debug, Deserialize)]
struct MetProperties {
    #[serde(default)]
    timeseries: Vec<MetTimestep>,
}

#[derive(Debug, Deserialize)]
struct MetTimestep {
    time: DateTime<Utc>,
    data: MetData,
}

#[derive(Debug, Deserialize)]
struct MetData {
    instant: MetInstant,
    next_1_hours: Option<MetPeriod>,
}

#[derive(Debug, Deserialize)]
struct MetInstant {
    #[serde(default)]
    details: MetInstantDetails,
}

#[derive(Debug, Default, Deserialize)]
struct MetInstantDetails {
    air_temperature: Option<f64>,
    wind_speed: Option<f64>,
    wind_from_direction: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetPeriod {
    #[serde(default)]
    details: MetPeriodDetails,
}

#[derive(Debug, Default, Deserialize)]
struct MetPeriodDetails {
    precipitation_amount: Option<f64>,
}

/// Parse a Locationforecast JSON response into samples, ordered by time.
///
/// # Errors
/// Errors if the JSON doesn't look like a Locationforecast response.
pub fn parse_timeseries(body: &str) -> Result<Vec<Sample>, ForecastError> {
    let response: MetResponse = serde_json::from_str(body)?;

    let mut samples: Vec<Sample> = response
        .properties
        .timeseries
        .into_iter()
        .map(|step| Sample {
            time: step.time,
            air_temperature: step.data.instant.details.air_temperature,
            wind_speed: step.data.instant.details.wind_speed,
            wind_from_direction: step.data.instant.details.wind_from_direction,
            precipitation_mm: step
                .data
                .next_1_hours
                .and_then(|period| period.details.precipitation_amount)
                .unwrap_or(0.0),
        })
        .collect();

    samples.sort_by_key(|sample| sample.time);
    Ok(samples)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_locationforecast() {
        let body = json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [-0.1, 51.5, 15] },
            "properties": {
                "meta": { "updated_at": "2026-10-17T09:30:12Z" },
                "timeseries": [
                    {
                        "time": "2026-10-17T11:00:00Z",
                        "data": {
                            "instant": { "details": {
                                "air_temperature": 13.0,
                                "wind_speed": 4.1,
                                "wind_from_direction": 230.2
                            } },
                            "next_6_hours": { "details": { "precipitation_amount": 2.0 } }
                        }
                    },
                    {
                        "time": "2026-10-17T10:00:00Z",
                        "data": {
                            "instant": { "details": {
                                "air_temperature": 12.3,
                                "wind_speed": 3.8,
                                "wind_from_direction": 225.0
                            } },
                            "next_1_hours": {
                                "summary": { "symbol_code": "lightrain" },
                                "details": { "precipitation_amount": 0.4 }
                            }
                        }
                    }
                ]
            }
        })
        .to_string();

        let samples = parse_timeseries(&body).unwrap();
        assert_eq!(samples.len(), 2);

        assert_eq!(
            samples[0],
            Sample {
                time: Utc.with_ymd_and_hms(2026, 10, 17, 10, 0, 0).unwrap(),
                air_temperature: Some(12.3),
                wind_speed: Some(3.8),
                wind_from_direction: Some(225.0),
                precipitation_mm: 0.4,
            }
        );
        // Only the hourly precipitation counts.
        assert_eq!(samples[1].precipitation_mm, 0.0);
        assert_eq!(samples[1].air_temperature, Some(13.0));
    }

    #[test]
    fn tolerates_missing_details() {
        let body = json!({
            "properties": { "timeseries": [
                { "time": "2026-10-17T10:00:00Z", "data": { "instant": {} } }
            ] }
        })
        .to_string();

        let samples = parse_timeseries(&body).unwrap();
        assert_eq!(samples[0].air_temperature, None);
        assert_eq!(samples[0].precipitation_mm, 0.0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_timeseries("<html>502 Bad Gateway</html>"),
            Err(ForecastError::Parse(_))
        ));
        assert!(matches!(
            parse_timeseries("{\"type\": \"Feature\"}"),
            Err(ForecastError::Parse(_))
        ));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "ы".repeat(300);
        let truncated = truncate_body(&body);
        assert_eq!(truncated.chars().count(), 203);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
