use std::sync::Arc;

use bot_commons::{
    useful_methods::{BotStuff, MessageStuff},
    user_resolving::MentionResolver,
};
use teloxide::{prelude::*, types::Me, RequestError};

use crate::{actions, context::BotContext, error::BotError};

use self::commands::{make_command, CANCEL};

pub mod commands;

pub use commands::Command;

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    ctx: Arc<BotContext>,
) -> Result<(), RequestError> {
    if message.from.as_ref().is_some_and(|user| user.id == me.id) {
        return Ok(());
    }

    ctx.seen_users.lock().await.see_users_from_message(&message);

    let Some(text) = message.text() else {
        return Ok(());
    };
    let chat_id = message.chat.id;
    let sender = message.from.as_ref().map(|user| user.id);

    if let Some((command, future)) = make_command(&ctx, &bot, &me, &message, text) {
        log::debug!("Chat {chat_id} sent {}", command.callname);

        // Any other command means the user moved on from naming the place.
        if command.callname != CANCEL.callname {
            if let Some(sender) = sender {
                actions::cancel_pending_name(&ctx, chat_id, sender).await;
            }
        }

        let reply = match future.await? {
            Ok(Some(reply)) => reply,
            Ok(None) => return Ok(()),
            Err(e) => {
                match &e {
                    BotError::CoordinatesNotSet => log::debug!("Chat {chat_id}: {e}"),
                    _ => log::warn!("Failed to run {} in chat {chat_id}: {e}", command.callname),
                }
                e.user_message().to_string()
            }
        };

        bot.send_html(chat_id, reply, message.id).await?;
        return Ok(());
    }

    if message.is_command() {
        // Someone else's command.
        return Ok(());
    }

    let Some(sender) = sender else {
        return Ok(());
    };

    let reply = match actions::receive_location_name(&ctx, chat_id, sender, text).await {
        Ok(Some(reply)) => reply,
        Ok(None) => return Ok(()),
        Err(e) => {
            log::warn!("Failed to save the place name in chat {chat_id}: {e}");
            e.user_message().to_string()
        }
    };

    bot.send_html(chat_id, reply, message.id).await?;
    Ok(())
}
