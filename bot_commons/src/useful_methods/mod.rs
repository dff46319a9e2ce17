use std::future::Future;

use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    sugar::request::{RequestLinkPreviewExt, RequestReplyExt},
    types::{ChatAction, ChatId, Message, MessageId, ParseMode, Recipient},
    Bot, RequestError,
};

use crate::teloxide_retry;

pub trait MessageStuff {
    /// Text of the message, or its caption if it has no text.
    fn text_full(&self) -> Option<&str>;
    /// Returns `true` if this message text starts with a `/command`.
    fn is_command(&self) -> bool;
}

impl MessageStuff for Message {
    fn text_full(&self) -> Option<&str> {
        self.text().or_else(|| self.caption())
    }
    fn is_command(&self) -> bool {
        self.text_full().is_some_and(|text| text.starts_with('/'))
    }
}

pub trait BotStuff {
    /// Opinionated method to send a message, with HTML markup, no link previews,
    /// and retries due to flood waiting or network issues.
    fn send_html(
        &self,
        to_where: impl Into<Recipient> + Send,
        text: impl Into<String> + Send,
        reply_to: impl Into<Option<MessageId>> + Send,
    ) -> impl Future<Output = Result<Message, RequestError>> + Send;

    fn typing(&self, to_where: ChatId) -> impl Future<Output = Result<(), RequestError>> + Send;
}

impl BotStuff for Bot {
    async fn send_html(
        &self,
        to_where: impl Into<Recipient> + Send,
        text: impl Into<String> + Send,
        reply_to: impl Into<Option<MessageId>> + Send,
    ) -> Result<Message, RequestError> {
        let to_where: Recipient = to_where.into();
        let text: String = text.into();
        let reply_to = reply_to.into();

        teloxide_retry!({
            let mut request = self
                .send_message(to_where.clone(), text.clone())
                .parse_mode(ParseMode::Html)
                .disable_link_preview(true);
            if let Some(reply_to) = reply_to {
                request = request.reply_to(reply_to);
            }
            request.await
        })
    }
    async fn typing(&self, to_where: ChatId) -> Result<(), RequestError> {
        self.send_chat_action(to_where, ChatAction::Typing).await?;
        Ok(())
    }
}
