use std::{future::Future, pin::Pin};

use bot_commons::{
    get_admin_of,
    useful_methods::BotStuff,
    user_resolving::MentionResolver,
};
use chrono::Utc;
use teloxide::{
    types::{BotCommand, Me, Message, UserId},
    Bot, RequestError,
};

use crate::{
    actions::{self, authorize, Authorization, DailyRequest, DAILY_USAGE, SETCOORDS_USAGE},
    context::BotContext,
    error::BotError,
};

pub const COMMANDS: &[Command] = &[
    START, HELP, FORECAST, SETCOORDS, SETADMIN, DAILY, STATUS, CANCEL,
];

/// Text to reply with, if any, or an error to tell the user about.
pub type Ret = Result<Result<Option<String>, BotError>, RequestError>;
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Ret> + Send + 'a>>;

const NOT_ALLOWED: &str = concat!(
    "Only the admin of this chat can do that.\n",
    "Until an admin is assigned with /setadmin, group administrators can."
);

pub struct CommandParams<'a> {
    pub ctx: &'a BotContext,
    pub bot: &'a Bot,
    pub message: &'a Message,
    /// Everything after the command, trimmed.
    pub params: &'a str,
}

impl CommandParams<'_> {
    fn sender(&self) -> Option<UserId> {
        self.message.from.as_ref().map(|user| user.id)
    }

    /// Check if the sender may change this chat's settings.
    async fn is_privileged(&self, admin_id: Option<UserId>) -> Result<bool, RequestError> {
        let message = self.message;
        let sender = self.sender();
        let sent_as_chat = message
            .sender_chat
            .as_ref()
            .is_some_and(|chat| chat.id == message.chat.id);

        Ok(
            match authorize(admin_id, sender, message.chat.is_private(), sent_as_chat) {
                Authorization::Granted => true,
                Authorization::Denied => false,
                Authorization::NeedsChatAdmin => match sender {
                    Some(sender) => get_admin_of(self.bot, sender, message.chat.id)
                        .await?
                        .is_some(),
                    None => false,
                },
            },
        )
    }
}

/// Split a message text into a command callname and its parameters.
///
/// Returns `None` if this is not a command, or if it's a `/command@SomeBot`
/// addressed to a bot other than `bot_username`.
#[must_use]
pub fn split_command<'a>(text: &'a str, bot_username: &str) -> Option<(&'a str, &'a str)> {
    if !text.starts_with('/') {
        return None;
    }

    let command = text.split_whitespace().next()?;
    if !command.is_ascii() {
        // Telegram commands must be ASCII.
        // See https://core.telegram.org/bots/api#botcommand
        return None;
    }
    let params = text[command.len()..].trim();

    let callname = match command.split_once('@') {
        // Bot names are guaranteed ASCII, so ignore ASCII case specifically.
        Some((callname, username)) if username.eq_ignore_ascii_case(bot_username) => callname,
        Some(_) => return None,
        None => command,
    };

    Some((callname, params))
}

/// Find the command in this message, if it's one of ours, and make a future running it.
pub fn make_command<'a>(
    ctx: &'a BotContext,
    bot: &'a Bot,
    me: &Me,
    message: &'a Message,
    text: &'a str,
) -> Option<(&'static Command, CommandFuture<'a>)> {
    let (callname, params) = split_command(text, me.username())?;
    let command = COMMANDS
        .iter()
        .find(|command| command.is_matching_callname(callname))?;

    let future = (command.function)(CommandParams {
        ctx,
        bot,
        message,
        params,
    });
    Some((command, future))
}

pub struct Command {
    pub callname: &'static str,
    pub description: &'static str,
    pub function: fn(CommandParams) -> CommandFuture,
    hidden: bool,
}

impl Command {
    pub fn is_matching_callname(&self, command: &str) -> bool {
        self.callname
            .split_ascii_whitespace()
            .next()
            .is_some_and(|x| x.eq_ignore_ascii_case(command))
    }

    pub fn get_help(&self, mut output: impl std::fmt::Write) -> Result<(), std::fmt::Error> {
        output.write_str(self.callname)?;
        if !self.description.is_empty() {
            output.write_str(" - ")?;
            output.write_str(self.description)?;
        }

        Ok(())
    }

    pub fn generate_help() -> String {
        let mut response = String::from(concat!(
            "This bot tells the weather forecast for the place set in this chat.\n\n",
            "<b>Commands:</b>\n\n"
        ));
        for command in COMMANDS {
            if command.hidden {
                continue;
            }
            // Writing into a String can't fail.
            let _ = command.get_help(&mut response);
            response += "\n\n";
        }
        response.push_str("Forecast data is provided by MET Norway.");
        response
    }

    pub fn generate_bot_commands() -> Vec<BotCommand> {
        let mut output = Vec::new();

        for command in COMMANDS {
            if command.hidden {
                continue;
            }
            let Some(callname) = command.callname.split_ascii_whitespace().next() else {
                continue;
            };

            // Cut off the /
            let callname = callname[1..].trim().to_string();
            let description = command
                .description
                .replace("&lt;", "<")
                .replace("&gt;", ">");

            output.push(BotCommand {
                command: callname,
                description,
            });
        }

        output
    }
}

///////////////////////////////////////
/////////////////COMMAND DEFINITIONS
///////////////////////////////////////

/// Wraps the function's return value in a pinning closure.
macro_rules! wrap {
    ($thing:expr) => {
        |cp| Box::pin($thing(cp))
    };
}

/// Unwrap a result, or end the command telling the user about the error.
macro_rules! try_bot {
    ($result:expr) => {
        match $result {
            Ok(x) => x,
            Err(e) => return Ok(Err(e.into())),
        }
    };
}

macro_rules! reply {
    ($text:expr) => {
        return Ok(Ok(Some(String::from($text))))
    };
}

pub const START: Command = Command {
    callname: "/start",
    description: "",
    function: wrap!(start),
    hidden: true,
};
async fn start(cp: CommandParams<'_>) -> Ret {
    if !cp.message.chat.is_private() {
        return Ok(Ok(None));
    }
    reply!(Command::generate_help());
}

pub const HELP: Command = Command {
    callname: "/help",
    description: "Show this help.",
    function: wrap!(help),
    hidden: false,
};
async fn help(_: CommandParams<'_>) -> Ret {
    reply!(Command::generate_help());
}

pub const FORECAST: Command = Command {
    callname: "/forecast",
    description: "Show the weather forecast for this chat's place.",
    function: wrap!(forecast),
    hidden: false,
};
async fn forecast(cp: CommandParams<'_>) -> Ret {
    if let Err(e) = cp.bot.typing(cp.message.chat.id).await {
        log::debug!("Failed to send typing action: {e}");
    }
    let text = try_bot!(actions::forecast_for_chat(cp.ctx, cp.message.chat.id, Utc::now()).await);
    reply!(text);
}

pub const SETCOORDS: Command = Command {
    callname: "/setcoords &lt;lat&gt; &lt;lon&gt; [name]",
    description: "Set the place to forecast for. Admin only.",
    function: wrap!(setcoords),
    hidden: false,
};
async fn setcoords(cp: CommandParams<'_>) -> Ret {
    let chat_id = cp.message.chat.id;
    let settings = try_bot!(cp.ctx.db.get_chat(chat_id).await);
    if !cp.is_privileged(settings.and_then(|s| s.admin_id)).await? {
        reply!(NOT_ALLOWED);
    }
    if cp.params.is_empty() {
        reply!(SETCOORDS_USAGE);
    }

    let text = try_bot!(actions::set_coordinates(cp.ctx, chat_id, cp.sender(), cp.params).await);
    reply!(text);
}

pub const SETADMIN: Command = Command {
    callname: "/setadmin [@username|id]",
    description: concat!(
        "Assign the admin of this chat: yourself, the mentioned user, ",
        "or the one you reply to. Admin only."
    ),
    function: wrap!(setadmin),
    hidden: false,
};
async fn setadmin(cp: CommandParams<'_>) -> Ret {
    let chat_id = cp.message.chat.id;
    let settings = try_bot!(cp.ctx.db.get_chat(chat_id).await);
    if !cp.is_privileged(settings.and_then(|s| s.admin_id)).await? {
        reply!(NOT_ALLOWED);
    }

    let mentioned = cp
        .ctx
        .seen_users
        .lock()
        .await
        .get_mentioned_users(cp.message, cp.params);

    let target = match actions::pick_admin_target(&mentioned, cp.message.from.as_ref()) {
        Ok(target) => target,
        Err(text) => reply!(text),
    };

    let text = try_bot!(actions::set_admin(cp.ctx, chat_id, target).await);
    reply!(text);
}

pub const DAILY: Command = Command {
    callname: "/daily [on|off]",
    description: "Show or toggle the daily forecast. Toggling is admin only.",
    function: wrap!(daily),
    hidden: false,
};
async fn daily(cp: CommandParams<'_>) -> Ret {
    let chat_id = cp.message.chat.id;
    match DailyRequest::parse(cp.params) {
        DailyRequest::Status => {
            let text = try_bot!(actions::daily_status(cp.ctx, chat_id).await);
            reply!(text);
        }
        DailyRequest::Invalid => reply!(DAILY_USAGE),
        DailyRequest::Set(enabled) => {
            let settings = try_bot!(cp.ctx.db.get_chat(chat_id).await);
            if !cp.is_privileged(settings.and_then(|s| s.admin_id)).await? {
                reply!(NOT_ALLOWED);
            }
            let text = try_bot!(actions::set_daily(cp.ctx, chat_id, enabled).await);
            reply!(text);
        }
    }
}

pub const STATUS: Command = Command {
    callname: "/status",
    description: "Show the settings of this chat.",
    function: wrap!(status),
    hidden: false,
};
async fn status(cp: CommandParams<'_>) -> Ret {
    let text = try_bot!(actions::status(cp.ctx, cp.message.chat.id).await);
    reply!(text);
}

pub const CANCEL: Command = Command {
    callname: "/cancel",
    description: "",
    function: wrap!(cancel),
    hidden: true,
};
async fn cancel(cp: CommandParams<'_>) -> Ret {
    let Some(sender) = cp.sender() else {
        return Ok(Ok(None));
    };
    if actions::cancel_pending_name(cp.ctx, cp.message.chat.id, sender).await {
        reply!("Okay, the place stays unnamed.");
    }
    reply!("Nothing to cancel.");
}
