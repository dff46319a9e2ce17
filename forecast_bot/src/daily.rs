use std::{future::Future, sync::Weak};

use bot_commons::useful_methods::BotStuff;
use chrono::{DateTime, Timelike, Utc};
use teloxide::{
    types::{ChatId, MessageId},
    ApiError, Bot, RequestError,
};
use tokio::time::{sleep, Duration};

use crate::{
    actions::forecast_for_settings, context::BotContext, error::BotError, types::ChatSettings,
};

const CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Send the daily forecast to every chat that wants one, once per local day,
/// as soon as the local time is past `hour` o'clock.
///
/// Returns once the context is gone.
pub async fn daily_forecast_spinloop(bot: Bot, ctx: Weak<BotContext>, hour: u32) {
    loop {
        let Some(ctx) = ctx.upgrade() else {
            // Bot is shutting down.
            return;
        };

        let now = Utc::now();
        if now.with_timezone(&ctx.timezone).hour() >= hour {
            if let Err(e) = send_daily_forecasts(&bot, &ctx, now).await {
                log::error!("Failed to send daily forecasts: {e}");
            }
        }

        drop(ctx);
        sleep(CHECK_INTERVAL).await;
    }
}

async fn send_daily_forecasts(
    bot: &Bot,
    ctx: &BotContext,
    now: DateTime<Utc>,
) -> Result<(), BotError> {
    let today = now.with_timezone(&ctx.timezone).date_naive();
    let chats = ctx.db.chats_due_daily(today).await?;
    if chats.is_empty() {
        return Ok(());
    }
    log::info!("Sending daily forecasts to {} chats", chats.len());

    for settings in chats {
        deliver_daily(ctx, &settings, now, |chat_id, text| async move {
            bot.send_html(chat_id, text, None::<MessageId>)
                .await
                .map(|_| ())
        })
        .await?;
    }

    Ok(())
}

/// What happened to one chat's daily forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DailyOutcome {
    Sent,
    /// Will be tried again on the next check.
    FetchFailed,
    /// Flood limits and network errors were already retried; not tried again today.
    SendFailed,
    /// The chat blocked or removed the bot, so its daily forecast got turned off.
    ChatGone,
}

/// Make the daily forecast for one chat, hand it to `send`, and record the outcome.
///
/// Errors only if the database fails.
async fn deliver_daily<F, Fut>(
    ctx: &BotContext,
    settings: &ChatSettings,
    now: DateTime<Utc>,
    send: F,
) -> Result<DailyOutcome, BotError>
where
    F: FnOnce(ChatId, String) -> Fut,
    Fut: Future<Output = Result<(), RequestError>>,
{
    let chat_id = settings.chat_id;
    let today = now.with_timezone(&ctx.timezone).date_naive();

    let text = match forecast_for_settings(ctx, settings, now).await {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Failed to make the daily forecast for chat {chat_id}: {e}");
            return Ok(DailyOutcome::FetchFailed);
        }
    };

    Ok(match send(chat_id, text).await {
        Ok(()) => {
            ctx.db.mark_daily_sent(chat_id, today).await?;
            DailyOutcome::Sent
        }
        Err(e) if is_chat_gone(&e) => {
            log::info!("Chat {chat_id} is gone ({e}), turning its daily forecast off");
            ctx.db.set_daily_enabled(chat_id, false).await?;
            DailyOutcome::ChatGone
        }
        Err(e) => {
            log::warn!("Failed to send the daily forecast to chat {chat_id}: {e}");
            ctx.db.mark_daily_sent(chat_id, today).await?;
            DailyOutcome::SendFailed
        }
    })
}

/// Returns `true` if this error means we can't post in that chat anymore.
fn is_chat_gone(error: &RequestError) -> bool {
    matches!(
        error,
        RequestError::Api(
            ApiError::BotBlocked
                | ApiError::BotKicked
                | ApiError::BotKickedFromSupergroup
                | ApiError::ChatNotFound
                | ApiError::UserDeactivated
        )
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::{database::Database, forecast::fake::FakeProvider, types::Coordinates};

    const CHAT: ChatId = ChatId(-1001);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 7, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    /// Context with one chat due for a daily forecast.
    async fn context(provider: FakeProvider) -> (BotContext, ChatSettings) {
        let db = Database::new_in_memory().await.unwrap();
        db.set_coordinates(CHAT, Coordinates::new(51.5, -0.1).unwrap(), None)
            .await
            .unwrap();
        let settings = db.get_chat(CHAT).await.unwrap().unwrap();
        let ctx = BotContext::new(db, Arc::new(provider), chrono_tz::UTC, 4);
        (ctx, settings)
    }

    #[test]
    fn gone_chats() {
        assert!(is_chat_gone(&RequestError::Api(ApiError::BotBlocked)));
        assert!(is_chat_gone(&RequestError::Api(ApiError::BotKicked)));
        assert!(is_chat_gone(&RequestError::Api(ApiError::ChatNotFound)));
        assert!(!is_chat_gone(&RequestError::Api(ApiError::MessageIsTooLong)));
        assert!(!is_chat_gone(&RequestError::Api(ApiError::Unknown(
            String::from("Bad Request: something else")
        ))));
    }

    #[tokio::test]
    async fn sent_once_per_day() {
        let (ctx, settings) = context(FakeProvider::new(now())).await;

        let outcome = deliver_daily(&ctx, &settings, now(), |chat_id, text| async move {
            assert_eq!(chat_id, CHAT);
            assert!(text.contains("51.5, -0.1"));
            Ok::<(), RequestError>(())
        })
        .await
        .unwrap();
        assert_eq!(outcome, DailyOutcome::Sent);

        assert!(ctx.db.chats_due_daily(today()).await.unwrap().is_empty());
        let settings = ctx.db.get_chat(CHAT).await.unwrap().unwrap();
        assert_eq!(settings.last_daily_sent, Some(today()));
        assert!(settings.daily_enabled);
    }

    #[tokio::test]
    async fn gone_chat_is_turned_off() {
        let (ctx, settings) = context(FakeProvider::new(now())).await;

        let outcome = deliver_daily(&ctx, &settings, now(), |_, _| async {
            Err::<(), _>(RequestError::Api(ApiError::BotBlocked))
        })
        .await
        .unwrap();
        assert_eq!(outcome, DailyOutcome::ChatGone);

        let settings = ctx.db.get_chat(CHAT).await.unwrap().unwrap();
        assert!(!settings.daily_enabled);
        // Not due tomorrow either.
        let tomorrow = today().succ_opt().unwrap();
        assert!(ctx.db.chats_due_daily(tomorrow).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_send_waits_for_tomorrow() {
        let (ctx, settings) = context(FakeProvider::new(now())).await;

        let outcome = deliver_daily(&ctx, &settings, now(), |_, _| async {
            Err::<(), _>(RequestError::Api(ApiError::Unknown(String::from(
                "Bad Request: not enough rights to send text messages to the chat",
            ))))
        })
        .await
        .unwrap();
        assert_eq!(outcome, DailyOutcome::SendFailed);

        assert!(ctx.db.chats_due_daily(today()).await.unwrap().is_empty());
        let settings = ctx.db.get_chat(CHAT).await.unwrap().unwrap();
        assert!(settings.daily_enabled);
        let tomorrow = today().succ_opt().unwrap();
        assert_eq!(ctx.db.chats_due_daily(tomorrow).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_retried() {
        let (ctx, settings) = context(FakeProvider::failing()).await;
        let called = AtomicBool::new(false);
        let sent = &called;

        let outcome = deliver_daily(&ctx, &settings, now(), move |_, _| async move {
            sent.store(true, Ordering::SeqCst);
            Ok::<(), RequestError>(())
        })
        .await
        .unwrap();
        assert_eq!(outcome, DailyOutcome::FetchFailed);
        assert!(!called.load(Ordering::SeqCst));

        // Still due on the next check.
        assert_eq!(ctx.db.chats_due_daily(today()).await.unwrap().len(), 1);
        let settings = ctx.db.get_chat(CHAT).await.unwrap().unwrap();
        assert_eq!(settings.last_daily_sent, None);
        assert!(settings.daily_enabled);
    }
}
