use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ForecastError, ForecastProvider, Sample};
use crate::types::Coordinates;

/// Provider answering with one fixed sample, or always failing.
#[derive(Debug)]
pub struct FakeProvider {
    at: DateTime<Utc>,
    fail: bool,
}

impl FakeProvider {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            at: Utc::now(),
            fail: true,
        }
    }
}

#[async_trait]
impl ForecastProvider for FakeProvider {
    fn attribution(&self) -> &'static str {
        "Fake Weather"
    }

    async fn fetch(&self, _coordinates: Coordinates) -> Result<Vec<Sample>, ForecastError> {
        if self.fail {
            return Err(ForecastError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: String::from("down for maintenance"),
            });
        }
        Ok(vec![Sample {
            time: self.at,
            air_temperature: Some(10.0),
            wind_speed: Some(2.0),
            wind_from_direction: Some(180.0),
            precipitation_mm: 0.5,
        }])
    }
}
