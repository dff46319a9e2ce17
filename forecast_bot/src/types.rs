use std::fmt::Display;

use chrono::NaiveDate;
use teloxide::types::{ChatId, UserId};

/// Longest location name we store, in characters.
pub const MAX_LOCATION_NAME_LEN: usize = 64;

/// A validated latitude/longitude pair, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinatesError {
    #[error("expected a latitude and a longitude")]
    WrongArgumentCount,
    #[error("\"{0}\" is not a number")]
    NotANumber(String),
    #[error("latitude {0} is out of range, it must be between -90 and 90")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is out of range, it must be between -180 and 180")]
    LongitudeOutOfRange(f64),
}

impl Coordinates {
    /// # Errors
    /// Errors if either value is not finite or is out of its range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinatesError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinatesError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinatesError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Parse command parameters like `51.5 -0.1 London` or `51.5, -0.1`.
    ///
    /// Returns the coordinates and whatever text follows them, trimmed,
    /// if there's any.
    ///
    /// # Errors
    /// Errors if there are less than two values or they are not valid coordinates.
    pub fn parse_params(params: &str) -> Result<(Self, Option<&str>), CoordinatesError> {
        let (latitude, rest) = next_number(params)?;
        let rest = rest.trim_start();
        // Allow "lat, lon" as people copy it from maps like that.
        let rest = rest.strip_prefix(',').unwrap_or(rest);
        let (longitude, rest) = next_number(rest)?;

        let coordinates = Self::new(latitude, longitude)?;
        let rest = rest.trim();
        Ok((coordinates, (!rest.is_empty()).then_some(rest)))
    }
}

/// Split off the first whitespace- or comma-delimited word and parse it as a number.
fn next_number(text: &str) -> Result<(f64, &str), CoordinatesError> {
    let text = text.trim_start();
    let end = text
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(text.len());
    let (word, rest) = text.split_at(end);
    if word.is_empty() {
        return Err(CoordinatesError::WrongArgumentCount);
    }

    let number: f64 = word
        .parse()
        .map_err(|_| CoordinatesError::NotANumber(word.to_string()))?;

    // "inf" and "NaN" parse fine as floats, but are not numbers for our purposes.
    if !number.is_finite() {
        return Err(CoordinatesError::NotANumber(word.to_string()));
    }

    Ok((number, rest))
}

impl Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// Trim a user-provided location name and cut it down to [`MAX_LOCATION_NAME_LEN`].
/// Returns `None` if nothing is left.
#[must_use]
pub fn sanitize_location_name(name: &str) -> Option<String> {
    let name: String = name.trim().chars().take(MAX_LOCATION_NAME_LEN).collect();
    let name = name.trim_end();
    (!name.is_empty()).then(|| name.to_string())
}

/// Everything stored about one chat.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub chat_id: ChatId,
    pub coordinates: Option<Coordinates>,
    pub location_name: Option<String>,
    /// The chat's bot administrator, if one was assigned.
    pub admin_id: Option<UserId>,
    pub daily_enabled: bool,
    /// Local date of the last daily forecast sent to this chat.
    pub last_daily_sent: Option<NaiveDate>,
}

impl ChatSettings {
    /// Settings of a chat that was never configured.
    #[must_use]
    pub fn empty(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            coordinates: None,
            location_name: None,
            admin_id: None,
            daily_enabled: true,
            last_daily_sent: None,
        }
    }

    /// Name to show for the configured place: the location name if set,
    /// otherwise the coordinates.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        self.location_name
            .clone()
            .or_else(|| self.coordinates.map(|c| c.to_string()))
    }
}

impl Display for ChatSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.coordinates {
            Some(coordinates) => writeln!(f, "<b>Coordinates</b>: {coordinates}")?,
            None => writeln!(f, "<b>Coordinates</b>: not set")?,
        }
        match &self.location_name {
            Some(name) => writeln!(f, "<b>Location</b>: {}", html_escape::encode_text(name))?,
            None => writeln!(f, "<b>Location</b>: not set")?,
        }
        match self.admin_id {
            Some(admin) => writeln!(f, "<b>Admin</b>: <code>{admin}</code>")?,
            None => writeln!(f, "<b>Admin</b>: not assigned")?,
        }
        write!(
            f,
            "<b>Daily forecast</b>: {}",
            if self.daily_enabled { "on" } else { "off" }
        )
    }
}
