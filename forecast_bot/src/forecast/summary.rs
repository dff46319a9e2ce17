use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;

use super::{ForecastError, Sample};

/// Weather right now, taken from the first sample of a forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentConditions {
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_from_direction: Option<f64>,
    pub precipitation_mm: f64,
}

/// Summary of one local day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub temp_min: Option<i32>,
    pub temp_max: Option<i32>,
    /// Mean over the day, rounded to one decimal.
    pub wind_speed: Option<f64>,
    /// Direction at the middle of the day's samples.
    pub wind_from_direction: Option<f64>,
    /// Total over the day, rounded to one decimal.
    pub precipitation_mm: f64,
}

impl DaySummary {
    /// Estimated snow in centimeters. Precipitation is assumed to be snow
    /// on days that don't get above freezing, at 1.5cm per millimeter.
    #[must_use]
    pub fn snow_cm(&self) -> f64 {
        match self.temp_max {
            Some(max) if max <= 0 => round1(self.precipitation_mm * 1.5),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// Local time the forecast was summarized at.
    pub generated_at: DateTime<Tz>,
    pub current: CurrentConditions,
    /// Days from today on, in order. Days without data are left out.
    pub days: Vec<DaySummary>,
}

impl Forecast {
    /// Summarize samples into `days` local days starting from the day of `now` in `timezone`.
    ///
    /// # Errors
    /// Errors with [`ForecastError::Empty`] if there are no samples at all.
    pub fn summarize(
        samples: &[Sample],
        timezone: Tz,
        now: DateTime<Utc>,
        days: u32,
    ) -> Result<Self, ForecastError> {
        let first = samples.first().ok_or(ForecastError::Empty)?;
        let current = CurrentConditions {
            temperature: first.air_temperature,
            wind_speed: first.wind_speed,
            wind_from_direction: first.wind_from_direction,
            precipitation_mm: first.precipitation_mm,
        };

        let generated_at = now.with_timezone(&timezone);
        let today = generated_at.date_naive();
        let last_day = today
            .checked_add_days(Days::new(u64::from(days.saturating_sub(1))))
            .unwrap_or(NaiveDate::MAX);

        let mut by_day: BTreeMap<NaiveDate, Vec<&Sample>> = BTreeMap::new();
        for sample in samples {
            let date = sample.time.with_timezone(&timezone).date_naive();
            if (today..=last_day).contains(&date) {
                by_day.entry(date).or_default().push(sample);
            }
        }

        let days = by_day
            .into_iter()
            .map(|(date, samples)| summarize_day(date, &samples))
            .collect();

        Ok(Forecast {
            generated_at,
            current,
            days,
        })
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.generated_at.date_naive()
    }
}

fn summarize_day(date: NaiveDate, samples: &[&Sample]) -> DaySummary {
    let temps: Vec<f64> = samples.iter().filter_map(|s| s.air_temperature).collect();
    let winds: Vec<f64> = samples.iter().filter_map(|s| s.wind_speed).collect();
    let directions: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.wind_from_direction)
        .collect();
    let precipitation: f64 = samples.iter().map(|s| s.precipitation_mm).sum();

    DaySummary {
        date,
        temp_min: temps
            .iter()
            .copied()
            .reduce(f64::min)
            .map(|t| t.round_ties_even() as i32),
        temp_max: temps
            .iter()
            .copied()
            .reduce(f64::max)
            .map(|t| t.round_ties_even() as i32),
        wind_speed: (!winds.is_empty())
            .then(|| round1(winds.iter().sum::<f64>() / winds.len() as f64)),
        wind_from_direction: directions.get(directions.len() / 2).copied(),
        precipitation_mm: round1(precipitation),
    }
}

/// Round to one decimal place, halves to even.
fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// 16-point compass name of a direction in degrees, or `?` if unknown.
#[must_use]
pub fn deg_to_compass(degrees: Option<f64>) -> &'static str {
    const DIRECTIONS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let Some(degrees) = degrees.filter(|d| d.is_finite()) else {
        return "?";
    };
    let index = ((degrees + 11.25) / 22.5).floor().rem_euclid(16.0) as usize;
    DIRECTIONS[index]
}
