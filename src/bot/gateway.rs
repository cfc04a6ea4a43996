//! Outbound delivery: the `Delivery` trait and its Telegram implementation.
//!
//! The state machine and the background tasks talk to Telegram only through
//! this trait, so tests can swap in a recording fake.

use async_trait::async_trait;
use std::fmt;
use teloxide::prelude::*;
use teloxide::types::{InputFile, KeyboardButton, KeyboardMarkup, ReplyMarkup};
use teloxide::{ApiError, RequestError};

/// Why an outbound delivery failed.
#[derive(Debug)]
pub enum DeliveryError {
    /// The recipient can never be reached again: blocked the bot, deleted
    /// their account, or the chat is gone. Callers stop targeting them.
    Unreachable,
    /// Anything else, including network trouble and rate limits. Worth
    /// retrying on a later tick.
    Transient(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "recipient unreachable"),
            Self::Transient(msg) => write!(f, "delivery failed: {}", msg),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Reply-keyboard change attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Leave whatever keyboard is currently shown alone.
    None,
    /// Show a one-time reply keyboard with the given button rows.
    Reply(Vec<Vec<String>>),
    /// Remove the current reply keyboard.
    Remove,
}

/// Outbound message channel to the user.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Send a text message, optionally changing the reply keyboard.
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Keyboard,
    ) -> Result<(), DeliveryError>;

    /// Send a photo with a caption.
    async fn send_photo(
        &self,
        chat_id: i64,
        image: Vec<u8>,
        caption: &str,
    ) -> Result<(), DeliveryError>;
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Delivery for TelegramClient {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Keyboard,
    ) -> Result<(), DeliveryError> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);

        match keyboard {
            Keyboard::None => {}
            Keyboard::Reply(rows) => {
                let buttons = rows
                    .into_iter()
                    .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>());
                let markup = KeyboardMarkup::new(buttons)
                    .resize_keyboard()
                    .one_time_keyboard();
                request = request.reply_markup(ReplyMarkup::Keyboard(markup));
            }
            Keyboard::Remove => {
                request = request.reply_markup(ReplyMarkup::kb_remove());
            }
        }

        request.await.map(drop).map_err(classify)
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        image: Vec<u8>,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let input_file = InputFile::memory(image).file_name("receipt.jpg");

        self.bot
            .send_photo(ChatId(chat_id), input_file)
            .caption(caption)
            .await
            .map(drop)
            .map_err(classify)
    }
}

/// Split Telegram failures into gone-forever and try-again-later.
fn classify(err: RequestError) -> DeliveryError {
    match err {
        RequestError::Api(
            ApiError::BotBlocked
            | ApiError::UserDeactivated
            | ApiError::ChatNotFound
            | ApiError::GroupDeactivated
            | ApiError::BotKicked,
        ) => DeliveryError::Unreachable,
        other => DeliveryError::Transient(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_bot_is_unreachable() {
        let err = classify(RequestError::Api(ApiError::BotBlocked));
        assert!(matches!(err, DeliveryError::Unreachable));
    }

    #[test]
    fn test_deactivated_user_is_unreachable() {
        let err = classify(RequestError::Api(ApiError::UserDeactivated));
        assert!(matches!(err, DeliveryError::Unreachable));
    }

    #[test]
    fn test_missing_chat_is_unreachable() {
        let err = classify(RequestError::Api(ApiError::ChatNotFound));
        assert!(matches!(err, DeliveryError::Unreachable));
    }

    #[test]
    fn test_unknown_api_error_is_transient() {
        let err = classify(RequestError::Api(ApiError::Unknown("server exploded".to_string())));
        match err {
            DeliveryError::Transient(msg) => assert!(msg.contains("server exploded")),
            other => panic!("expected transient, got {:?}", other),
        }
    }
}
