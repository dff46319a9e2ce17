//! This crate houses functions common for the bots in this workspace,
//! because some things are just boilerplate.

use std::future::Future;

use teloxide::prelude::*;

/// Helper traits on [`Message`] and [`Bot`].
pub mod useful_methods;

/// Resolving mentions of users in messages to user IDs.
pub mod user_resolving;

#[doc(hidden)]
pub mod __reexports {
    pub use log;
    pub use teloxide;
    pub use tokio;
}

/// How many times [`teloxide_retry`] retries a request before giving up.
pub const MAX_RETRIES: u32 = 5;

/// Initialize logging and start the `closure` in an async runtime.
/// Logging is enabled by default on level `info` unless overridden
/// by environment variable `RUST_LOG`. This uses the crate
/// [pretty_env_logger][] internally, see its documentation for more details.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything(closure: impl Future<Output = ()>) {
    let log_level = std::env::var_os("RUST_LOG")
        .unwrap_or_else(|| std::ffi::OsString::from("info"))
        .into_string()
        .unwrap_or_else(|_| String::from("info"));

    // journald adds its own timestamps.
    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_level);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    log::info!("Starting up...");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to build the async runtime: {e}");
            return;
        }
    };

    runtime.block_on(closure);
}

/// Find out if a user of this ID is an admin of the specified chat of that ID.
/// If so, returns the `ChatMember` object describing their permissions,
/// otherwise `None`.
pub async fn get_admin_of(
    bot: &Bot,
    user: UserId,
    chat: ChatId,
) -> Result<Option<teloxide::types::ChatMember>, teloxide::RequestError> {
    Ok(bot
        .get_chat_administrators(chat)
        .await?
        .into_iter()
        .find(|x| x.user.id == user))
}

/// Run a Telegram request expression, retrying it if Telegram asks us to
/// wait out a flood limit or if the network hiccups. Gives up after
/// [`MAX_RETRIES`] retries and evaluates to the last result.
///
/// The expression is evaluated anew on each attempt, so it must build
/// and `.await` the request itself:
///
/// ```ignore
/// teloxide_retry!(bot.send_message(chat_id, "hi").await)
/// ```
#[macro_export]
macro_rules! teloxide_retry {
    ($request:expr) => {{
        use $crate::__reexports::{log, teloxide::RequestError, tokio};
        let mut retries: u32 = 0;
        loop {
            match $request {
                Err(RequestError::RetryAfter(wait)) if retries < $crate::MAX_RETRIES => {
                    retries += 1;
                    log::warn!("Flood limit hit, retrying in {:?}", wait.duration());
                    tokio::time::sleep(wait.duration()).await;
                }
                Err(RequestError::Network(e)) if retries < $crate::MAX_RETRIES => {
                    retries += 1;
                    log::warn!("Network error, retrying: {e}");
                    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                }
                other => break other,
            }
        }
    }};
}
