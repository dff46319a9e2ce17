use crate::{database, forecast::ForecastError};

/// Errors that can happen while answering a command.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("coordinates are not set for this chat")]
    CoordinatesNotSet,
    #[error(transparent)]
    Forecast(#[from] ForecastError),
    #[error("database error: {0}")]
    Database(#[from] database::Error),
}

impl BotError {
    /// What to tell the user. Internal details are only logged.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            BotError::CoordinatesNotSet => concat!(
                "Coordinates are not set for this chat.\n",
                "The admin can set them with <code>/setcoords &lt;lat&gt; &lt;lon&gt;</code>."
            ),
            BotError::Forecast(_) => "Failed to get the forecast. Please try again later.",
            BotError::Database(_) => "Something went wrong on our side. Please try again later.",
        }
    }
}
