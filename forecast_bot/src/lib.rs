//! Telegram bot that tells the weather forecast for a place set per chat.
//!
//! Forecast data comes from MET Norway's Locationforecast API.

/// Various types used throughout.
pub mod types;

/// Configuration from environment variables.
pub mod config;

/// The database.
pub mod database;

/// Getting forecasts and making them readable.
pub mod forecast;

mod context;
mod error;

/// Functions that do what commands ask, apart from talking to Telegram.
mod actions;

/// Functions that handle events from Telegram.
mod handlers;

/// Sending the forecast every day.
mod daily;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;
