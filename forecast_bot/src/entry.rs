use std::sync::Arc;

use teloxide::{dptree::deps, prelude::*};

use crate::{
    config::Config,
    context::BotContext,
    daily::daily_forecast_spinloop,
    database::Database,
    forecast::{met_no::MetNoProvider, ForecastProvider},
    handlers::{handle_message, Command},
};

/// Start the bot and run it until it's interrupted.
///
/// Start-up failures are logged and make this return early.
pub async fn entry() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Bad configuration: {e}");
            return;
        }
    };
    log::info!(
        "Forecasting {} days in {}",
        config.forecast_days,
        config.timezone
    );

    let bot = Bot::new(&config.token);

    if let Err(e) = bot.set_my_commands(Command::generate_bot_commands()).await {
        log::error!("Failed to set bot commands: {e}");
        return;
    }

    let db = match Database::new(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            log::error!("Failed to open database {}: {e}", config.database);
            return;
        }
    };

    let provider: Arc<dyn ForecastProvider> =
        match MetNoProvider::new(config.api_url.clone(), &config.user_agent) {
            Ok(provider) => Arc::new(provider),
            Err(e) => {
                log::error!("Failed to create the forecast provider: {e}");
                return;
            }
        };

    let ctx = Arc::new(BotContext::new(
        db,
        provider,
        config.timezone,
        config.forecast_days,
    ));

    match config.daily_hour {
        Some(hour) => {
            log::info!("Daily forecasts go out after {hour}:00");
            tokio::spawn(daily_forecast_spinloop(
                bot.clone(),
                Arc::downgrade(&ctx),
                hour,
            ));
        }
        None => log::info!("Daily forecasts are disabled"),
    }

    log::info!("Creating the handler...");

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Shutting down.");
}
