use bot_commons::user_resolving::UserLike;
use chrono::{DateTime, Utc};
use html_escape::encode_text;
use teloxide::types::{ChatId, User, UserId};

use crate::{
    context::BotContext,
    error::BotError,
    forecast::{format::render_forecast, Forecast},
    types::{sanitize_location_name, ChatSettings, Coordinates},
};

pub const SETCOORDS_USAGE: &str = concat!(
    "Usage: <code>/setcoords &lt;lat&gt; &lt;lon&gt; [place name]</code>\n",
    "Example: <code>/setcoords 55.75 37.62 Moscow</code>"
);

pub const DAILY_USAGE: &str = "Usage: <code>/daily on</code> or <code>/daily off</code>";

/// Outcome of checking whether a sender may change a chat's settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Granted,
    Denied,
    /// The chat has no bot admin yet; the sender may proceed if they
    /// administer the group on Telegram.
    NeedsChatAdmin,
}

/// Decide whether `sender` may change settings of a chat whose bot admin is `admin_id`.
/// `sent_as_chat` is set for messages posted on behalf of the chat itself,
/// which is how anonymous group administrators post.
///
/// Once a chat has a bot admin, only they are allowed. Until then, anyone in a
/// private chat is, as are anonymous administrators, and group chats otherwise
/// defer to their Telegram administrators.
#[must_use]
pub fn authorize(
    admin_id: Option<UserId>,
    sender: Option<UserId>,
    is_private: bool,
    sent_as_chat: bool,
) -> Authorization {
    match (admin_id, sender) {
        (Some(admin), Some(sender)) if admin == sender && !sent_as_chat => Authorization::Granted,
        (Some(_), _) => Authorization::Denied,
        (None, _) if is_private || sent_as_chat => Authorization::Granted,
        (None, _) => Authorization::NeedsChatAdmin,
    }
}

/// Fetch and render a forecast for the chat's stored coordinates.
pub async fn forecast_for_chat(
    ctx: &BotContext,
    chat_id: ChatId,
    now: DateTime<Utc>,
) -> Result<String, BotError> {
    let settings = ctx
        .db
        .get_chat(chat_id)
        .await?
        .ok_or(BotError::CoordinatesNotSet)?;
    forecast_for_settings(ctx, &settings, now).await
}

/// Fetch and render a forecast for already loaded chat settings.
pub async fn forecast_for_settings(
    ctx: &BotContext,
    settings: &ChatSettings,
    now: DateTime<Utc>,
) -> Result<String, BotError> {
    let coordinates = settings.coordinates.ok_or(BotError::CoordinatesNotSet)?;

    let samples = ctx.provider.fetch(coordinates).await?;
    let forecast = Forecast::summarize(&samples, ctx.timezone, now, ctx.forecast_days)?;

    Ok(render_forecast(
        &forecast,
        coordinates,
        settings.location_name.as_deref(),
        ctx.provider.attribution(),
    ))
}

/// Store coordinates from `/setcoords` parameters. If no place name follows them,
/// the sender is asked to send one next.
pub async fn set_coordinates(
    ctx: &BotContext,
    chat_id: ChatId,
    sender: Option<UserId>,
    params: &str,
) -> Result<String, BotError> {
    let (coordinates, name) = match Coordinates::parse_params(params) {
        Ok(parsed) => parsed,
        Err(e) => {
            return Ok(format!(
                "Could not read the coordinates: {}.\n\n{SETCOORDS_USAGE}",
                encode_text(&e.to_string())
            ))
        }
    };
    let name = name.and_then(sanitize_location_name);

    ctx.db
        .set_coordinates(chat_id, coordinates, name.as_deref())
        .await?;
    log::info!("Chat {chat_id} set coordinates to {coordinates}");

    let mut pending = ctx.pending_names.lock().await;
    match (name, sender) {
        (Some(name), _) => {
            if let Some(sender) = sender {
                pending.remove(&(chat_id, sender));
            }
            Ok(format!("Saved: {coordinates} ({})", encode_text(&name)))
        }
        (None, Some(sender)) => {
            pending.insert((chat_id, sender));
            Ok(format!(
                concat!(
                    "Saved: {}\n\n",
                    "Now send the name of this place, it will be shown on forecasts. ",
                    "Send /cancel to leave it unnamed."
                ),
                coordinates
            ))
        }
        (None, None) => Ok(format!("Saved: {coordinates}")),
    }
}

/// Handle a plain text message that may be the place name a user was asked for.
/// Returns `None` if this user wasn't asked for one in this chat.
pub async fn receive_location_name(
    ctx: &BotContext,
    chat_id: ChatId,
    sender: UserId,
    text: &str,
) -> Result<Option<String>, BotError> {
    if !ctx.pending_names.lock().await.remove(&(chat_id, sender)) {
        return Ok(None);
    }

    let Some(name) = sanitize_location_name(text) else {
        return Ok(Some(String::from(
            "That name is empty, so the place stays unnamed.",
        )));
    };

    if !ctx.db.set_location_name(chat_id, &name).await? {
        return Ok(Some(String::from(
            "There are no coordinates to name anymore.",
        )));
    }

    Ok(Some(format!("Saved the place name: {}", encode_text(&name))))
}

/// Stop waiting for a place name from this user. Returns `true` if we were.
pub async fn cancel_pending_name(ctx: &BotContext, chat_id: ChatId, sender: UserId) -> bool {
    ctx.pending_names.lock().await.remove(&(chat_id, sender))
}

/// Pick who `/setadmin` should assign out of the users its message mentions,
/// falling back to the sender if nobody is mentioned. Bots can't be admins.
///
/// # Errors
/// Errors with a message for the user if the target can't be figured out.
pub fn pick_admin_target(mentioned: &[UserLike], sender: Option<&User>) -> Result<UserId, String> {
    match mentioned.first() {
        Some(UserLike::UnresolvedUsername(username)) => Err(format!(
            concat!(
                "Could not find the user {}. ",
                "Pass their numeric ID, reply to their message, ",
                "or have them send any message where this bot can see it first."
            ),
            encode_text(username)
        )),
        Some(UserLike::User(user)) if user.is_bot => {
            Err(String::from("Bots can't be admins. Pick a person instead."))
        }
        Some(user) => user
            .id()
            .ok_or_else(|| String::from("Could not find that user.")),
        // Anonymous admins come from a placeholder bot user.
        None => sender.filter(|user| !user.is_bot).map(|user| user.id).ok_or_else(|| {
            String::from(concat!(
                "Anonymous admins can't be assigned. ",
                "Pass a user ID or reply to a message of the new admin instead."
            ))
        }),
    }
}

/// Assign the bot admin of a chat.
pub async fn set_admin(ctx: &BotContext, chat_id: ChatId, target: UserId) -> Result<String, BotError> {
    ctx.db.set_admin(chat_id, target).await?;
    log::info!("Chat {chat_id} assigned admin {target}");
    Ok(format!("Assigned admin: <code>{target}</code>"))
}

/// What `/daily` was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyRequest {
    Status,
    Set(bool),
    Invalid,
}

impl DailyRequest {
    #[must_use]
    pub fn parse(params: &str) -> Self {
        match params.trim().to_ascii_lowercase().as_str() {
            "" => DailyRequest::Status,
            "on" | "enable" | "yes" => DailyRequest::Set(true),
            "off" | "disable" | "no" => DailyRequest::Set(false),
            _ => DailyRequest::Invalid,
        }
    }
}

/// Report whether the daily forecast is on for a chat.
pub async fn daily_status(ctx: &BotContext, chat_id: ChatId) -> Result<String, BotError> {
    let settings = ctx
        .db
        .get_chat(chat_id)
        .await?
        .unwrap_or_else(|| ChatSettings::empty(chat_id));
    Ok(format!(
        "Daily forecast is {}.\n{DAILY_USAGE}",
        if settings.daily_enabled { "on" } else { "off" }
    ))
}

/// Turn the daily forecast on or off for a chat.
pub async fn set_daily(ctx: &BotContext, chat_id: ChatId, enabled: bool) -> Result<String, BotError> {
    ctx.db.set_daily_enabled(chat_id, enabled).await?;
    Ok(String::from(match enabled {
        true => "Daily forecast is now on.",
        false => "Daily forecast is now off.",
    }))
}

/// Describe everything stored about a chat.
pub async fn status(ctx: &BotContext, chat_id: ChatId) -> Result<String, BotError> {
    let settings = ctx
        .db
        .get_chat(chat_id)
        .await?
        .unwrap_or_else(|| ChatSettings::empty(chat_id));
    Ok(settings.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::{database::Database, forecast::fake::FakeProvider};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap()
    }

    async fn context(fail: bool) -> BotContext {
        let db = Database::new_in_memory().await.unwrap();
        let provider = match fail {
            true => FakeProvider::failing(),
            false => FakeProvider::new(now()),
        };
        BotContext::new(db, Arc::new(provider), chrono_tz::UTC, 4)
    }

    const CHAT: ChatId = ChatId(-1001);
    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);
    const ANONYMOUS: UserId = UserId(1087968824);

    #[test]
    fn authorization() {
        use Authorization::*;

        assert_eq!(authorize(Some(ALICE), Some(ALICE), false, false), Granted);
        assert_eq!(authorize(Some(ALICE), Some(BOB), false, false), Denied);
        assert_eq!(authorize(Some(ALICE), Some(BOB), true, false), Denied);
        assert_eq!(authorize(Some(ALICE), None, false, false), Denied);
        assert_eq!(authorize(None, Some(BOB), true, false), Granted);
        assert_eq!(authorize(None, Some(BOB), false, false), NeedsChatAdmin);
        assert_eq!(authorize(None, None, false, false), NeedsChatAdmin);
    }

    #[test]
    fn anonymous_admins() {
        use Authorization::*;

        // Posted on behalf of the group, from the placeholder bot.
        assert_eq!(authorize(None, Some(ANONYMOUS), false, true), Granted);
        assert_eq!(authorize(None, None, false, true), Granted);
        // Once there's a bot admin, anonymous posts don't count as them.
        assert_eq!(authorize(Some(ALICE), Some(ANONYMOUS), false, true), Denied);
        assert_eq!(authorize(Some(ANONYMOUS), Some(ANONYMOUS), false, true), Denied);
    }

    #[tokio::test]
    async fn forecast_without_coordinates() {
        let ctx = context(false).await;
        let err = forecast_for_chat(&ctx, CHAT, now()).await.unwrap_err();
        assert!(matches!(err, BotError::CoordinatesNotSet));
        assert!(err.user_message().contains("not set"));

        // A chat that only has an admin has no coordinates either.
        set_admin(&ctx, CHAT, ALICE).await.unwrap();
        let err = forecast_for_chat(&ctx, CHAT, now()).await.unwrap_err();
        assert!(matches!(err, BotError::CoordinatesNotSet));
    }

    #[tokio::test]
    async fn setcoords_then_forecast() {
        let ctx = context(false).await;
        let reply = set_coordinates(&ctx, CHAT, Some(ALICE), "51.5 -0.1")
            .await
            .unwrap();
        assert!(reply.starts_with("Saved: 51.5, -0.1"));

        let text = forecast_for_chat(&ctx, CHAT, now()).await.unwrap();
        assert!(text.contains("51.5, -0.1"));
        assert!(text.contains("Today"));
        assert!(text.contains("Fake Weather"));
    }

    #[tokio::test]
    async fn provider_failure() {
        let ctx = context(true).await;
        set_coordinates(&ctx, CHAT, Some(ALICE), "51.5 -0.1 London")
            .await
            .unwrap();
        let err = forecast_for_chat(&ctx, CHAT, now()).await.unwrap_err();
        assert!(matches!(err, BotError::Forecast(_)));
        assert!(!err.user_message().contains("maintenance"));
    }

    #[tokio::test]
    async fn invalid_coordinates_are_not_stored() {
        let ctx = context(false).await;
        let reply = set_coordinates(&ctx, CHAT, Some(ALICE), "<b> 0")
            .await
            .unwrap();
        assert!(reply.contains("&lt;b&gt;"));
        assert!(reply.contains("Usage"));

        let reply = set_coordinates(&ctx, CHAT, Some(ALICE), "100 0")
            .await
            .unwrap();
        assert!(reply.contains("latitude 100 is out of range"));
        assert_eq!(ctx.db.get_chat(CHAT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn place_name_inline() {
        let ctx = context(false).await;
        let reply = set_coordinates(&ctx, CHAT, Some(ALICE), "55.75, 37.62 Red Square")
            .await
            .unwrap();
        assert_eq!(reply, "Saved: 55.75, 37.62 (Red Square)");
        assert!(ctx.pending_names.lock().await.is_empty());

        let settings = ctx.db.get_chat(CHAT).await.unwrap().unwrap();
        assert_eq!(settings.location_name.as_deref(), Some("Red Square"));
    }

    #[tokio::test]
    async fn place_name_as_next_message() {
        let ctx = context(false).await;
        set_coordinates(&ctx, CHAT, Some(ALICE), "55.75 37.62")
            .await
            .unwrap();

        // Somebody else chatting doesn't name the place.
        assert_eq!(
            receive_location_name(&ctx, CHAT, BOB, "lol").await.unwrap(),
            None
        );

        let reply = receive_location_name(&ctx, CHAT, ALICE, "  Moscow  ")
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("Saved the place name: Moscow"));

        // Only asked once.
        assert_eq!(
            receive_location_name(&ctx, CHAT, ALICE, "Another").await.unwrap(),
            None
        );
        let settings = ctx.db.get_chat(CHAT).await.unwrap().unwrap();
        assert_eq!(settings.location_name.as_deref(), Some("Moscow"));
    }

    #[tokio::test]
    async fn place_name_cancelled() {
        let ctx = context(false).await;
        set_coordinates(&ctx, CHAT, Some(ALICE), "55.75 37.62")
            .await
            .unwrap();
        assert!(cancel_pending_name(&ctx, CHAT, ALICE).await);
        assert!(!cancel_pending_name(&ctx, CHAT, ALICE).await);
        assert_eq!(
            receive_location_name(&ctx, CHAT, ALICE, "Moscow").await.unwrap(),
            None
        );
    }

    fn user(id: u64, is_bot: bool) -> User {
        User {
            id: UserId(id),
            is_bot,
            first_name: String::from("Test"),
            last_name: None,
            username: None,
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn admin_targets() {
        let alice = user(1, false);

        assert_eq!(pick_admin_target(&[], Some(&alice)), Ok(ALICE));
        assert!(pick_admin_target(&[], None).is_err());
        assert_eq!(
            pick_admin_target(&[UserLike::User(user(3, false))], Some(&alice)),
            Ok(UserId(3))
        );
        assert_eq!(
            pick_admin_target(&[UserLike::Id(BOB)], Some(&alice)),
            Ok(BOB)
        );
        let err = pick_admin_target(
            &[UserLike::UnresolvedUsername(String::from("@nobody"))],
            Some(&alice),
        )
        .unwrap_err();
        assert!(err.contains("@nobody"));
    }

    #[test]
    fn bots_are_never_admin_targets() {
        let alice = user(1, false);

        // Replying to a bot's message, like our own replies.
        let err = pick_admin_target(&[UserLike::User(user(777, true))], Some(&alice)).unwrap_err();
        assert!(err.contains("Bots can't be admins"));

        // Anonymous admins send as a placeholder bot.
        let anonymous = user(ANONYMOUS.0, true);
        let err = pick_admin_target(&[], Some(&anonymous)).unwrap_err();
        assert!(err.contains("Anonymous admins"));

        // They can still name a person.
        assert_eq!(
            pick_admin_target(&[UserLike::User(user(3, false))], Some(&anonymous)),
            Ok(UserId(3))
        );
    }

    #[tokio::test]
    async fn admin_is_stored() {
        let ctx = context(false).await;
        let reply = set_admin(&ctx, CHAT, BOB).await.unwrap();
        assert_eq!(reply, "Assigned admin: <code>2</code>");
        let settings = ctx.db.get_chat(CHAT).await.unwrap().unwrap();
        assert_eq!(settings.admin_id, Some(BOB));
        assert_eq!(
            authorize(settings.admin_id, Some(ALICE), false, false),
            Authorization::Denied
        );
    }

    #[test]
    fn daily_requests() {
        assert_eq!(DailyRequest::parse(""), DailyRequest::Status);
        assert_eq!(DailyRequest::parse(" ON "), DailyRequest::Set(true));
        assert_eq!(DailyRequest::parse("off"), DailyRequest::Set(false));
        assert_eq!(DailyRequest::parse("sometimes"), DailyRequest::Invalid);
    }

    #[tokio::test]
    async fn daily_toggle_and_status() {
        let ctx = context(false).await;
        assert!(daily_status(&ctx, CHAT).await.unwrap().contains("is on"));
        set_daily(&ctx, CHAT, false).await.unwrap();
        assert!(daily_status(&ctx, CHAT).await.unwrap().contains("is off"));

        let text = status(&ctx, CHAT).await.unwrap();
        assert!(text.contains("<b>Coordinates</b>: not set"));
        assert!(text.contains("<b>Daily forecast</b>: off"));
    }
}
