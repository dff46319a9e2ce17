use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::Coordinates;

/// Formatting a forecast into a message.
pub mod format;
/// MET Norway (yr.no) forecast provider.
pub mod met_no;
/// Summarizing raw samples into days.
pub mod summary;

#[cfg(test)]
pub(crate) mod fake;

pub use summary::{CurrentConditions, DaySummary, Forecast};

/// One point of a forecast's time series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: DateTime<Utc>,
    /// Degrees Celsius.
    pub air_temperature: Option<f64>,
    /// Meters per second.
    pub wind_speed: Option<f64>,
    /// Degrees, where the wind blows from; 0 is north, 90 is east.
    pub wind_from_direction: Option<f64>,
    /// Millimeters over the hour following `time`; zero if unknown.
    pub precipitation_mm: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("request to the weather provider failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("weather provider responded with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to parse the weather provider response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("weather provider returned no data")]
    Empty,
}

/// Something that can produce forecast samples for a place.
#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    /// Short name to attribute the data to.
    fn attribution(&self) -> &'static str;

    /// Fetch the forecast time series for given coordinates, ordered by time.
    async fn fetch(&self, coordinates: Coordinates) -> Result<Vec<Sample>, ForecastError>;
}
