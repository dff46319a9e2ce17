use std::fs;

use chrono_tz::Tz;
use url::Url;

/// MET Norway's Locationforecast endpoint, the data behind yr.no.
pub const DEFAULT_API_URL: &str = "https://api.met.no/weatherapi/locationforecast/2.0/complete";
pub const DEFAULT_DATABASE: &str = "sqlite:forecast_bot.sqlite";
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Moscow;
pub const DEFAULT_FORECAST_DAYS: u32 = 4;
/// Locationforecast doesn't go further than this.
pub const MAX_FORECAST_DAYS: u32 = 9;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no bot token: set TELEGRAM_TOKEN or put it into the \"{0}\" file")]
    NoToken(&'static str),
    #[error("{name} has an invalid value \"{value}\": {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the bot is configured with. Read from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token.
    pub token: String,
    /// SQLite database URL, like `sqlite:forecast_bot.sqlite`.
    pub database: String,
    /// Timezone forecast days and the daily broadcast are counted in.
    pub timezone: Tz,
    /// How many days, today included, a forecast covers.
    pub forecast_days: u32,
    /// Local hour after which the daily forecast is sent. `None` disables it.
    pub daily_hour: Option<u32>,
    /// MET Norway demands an identifying User-Agent.
    pub user_agent: String,
    pub api_url: Url,
}

impl Config {
    /// Read the config from environment variables. The token falls back
    /// to the `key` file (`key_debug` in debug builds) in the working directory.
    ///
    /// # Errors
    /// Errors if there's no token or some variable doesn't parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`], but reads variables with `lookup`.
    ///
    /// # Errors
    /// Errors if there's no token or some variable doesn't parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = match lookup("TELEGRAM_TOKEN").filter(|t| !t.trim().is_empty()) {
            Some(token) => token.trim().to_string(),
            None => {
                let key_file = match cfg!(debug_assertions) {
                    true => "key_debug",
                    false => "key",
                };
                fs::read_to_string(key_file)
                    .ok()
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
                    .ok_or(ConfigError::NoToken(key_file))?
            }
        };

        let database = lookup("FORECAST_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let timezone = match lookup("FORECAST_TIMEZONE") {
            Some(value) => value.parse::<Tz>().map_err(|e| ConfigError::Invalid {
                name: "FORECAST_TIMEZONE",
                reason: format!("{e}"),
                value,
            })?,
            None => DEFAULT_TIMEZONE,
        };

        let forecast_days = match lookup("FORECAST_DAYS") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(days) if (1..=MAX_FORECAST_DAYS).contains(&days) => days,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "FORECAST_DAYS",
                        value,
                        reason: format!("expected a number from 1 to {MAX_FORECAST_DAYS}"),
                    })
                }
            },
            None => DEFAULT_FORECAST_DAYS,
        };

        let daily_hour = match lookup("FORECAST_DAILY_HOUR") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(hour) if hour < 24 => Some(hour),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "FORECAST_DAILY_HOUR",
                        value,
                        reason: String::from("expected an hour from 0 to 23"),
                    })
                }
            },
            None => None,
        };

        let user_agent = lookup("FORECAST_USER_AGENT").unwrap_or_else(|| {
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
        });

        let api_url = match lookup("FORECAST_API_URL") {
            Some(value) => Url::parse(&value).map_err(|e| ConfigError::Invalid {
                name: "FORECAST_API_URL",
                reason: e.to_string(),
                value,
            })?,
            None => Url::parse(DEFAULT_API_URL).map_err(|e| ConfigError::Invalid {
                name: "FORECAST_API_URL",
                value: DEFAULT_API_URL.to_string(),
                reason: e.to_string(),
            })?,
        };

        Ok(Config {
            token,
            database,
            timezone,
            forecast_days,
            daily_hour,
            user_agent,
            api_url,
        })
    }
}
