use std::{collections::HashSet, sync::Arc};

use bot_commons::user_resolving::SeenUsers;
use chrono_tz::Tz;
use teloxide::types::{ChatId, UserId};
use tokio::sync::Mutex;

use crate::{database::Database, forecast::ForecastProvider};

/// State shared by all handlers.
pub struct BotContext {
    pub db: Database,
    pub provider: Arc<dyn ForecastProvider>,
    /// Timezone forecast days are counted in.
    pub timezone: Tz,
    pub forecast_days: u32,
    /// Users who set coordinates and were asked for the place name.
    pub pending_names: Mutex<HashSet<(ChatId, UserId)>>,
    pub seen_users: Mutex<SeenUsers>,
}

impl BotContext {
    #[must_use]
    pub fn new(
        db: Database,
        provider: Arc<dyn ForecastProvider>,
        timezone: Tz,
        forecast_days: u32,
    ) -> Self {
        Self {
            db,
            provider,
            timezone,
            forecast_days,
            pending_names: Mutex::new(HashSet::new()),
            seen_users: Mutex::new(SeenUsers::new()),
        }
    }
}
