//! Outbound messaging seam.
//!
//! The dialogue logic talks to Telegram only through [`Transport`], so the
//! same flows run against the real [`Bot`] and against in-memory fakes.

use std::fmt;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode, ReplyMarkup};
use teloxide::{ApiError, RequestError};

/// Failure of an outbound request
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// An edit carried exactly the content the message already shows
    NotModified,
    Request(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NotModified => write!(f, "Message is not modified"),
            TransportError::Request(msg) => write!(f, "Telegram request failed: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<RequestError> for TransportError {
    fn from(error: RequestError) -> Self {
        match error {
            RequestError::Api(ApiError::MessageNotModified) => TransportError::NotModified,
            other => TransportError::Request(other.to_string()),
        }
    }
}

/// Options for a new message
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub parse_mode: Option<ParseMode>,
    pub reply_markup: Option<ReplyMarkup>,
}

impl SendOptions {
    pub fn html() -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            reply_markup: None,
        }
    }

    pub fn with_markup(mut self, markup: impl Into<ReplyMarkup>) -> Self {
        self.reply_markup = Some(markup.into());
        self
    }
}

/// Options for an in-place edit; only inline keyboards can be edited
#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    pub parse_mode: Option<ParseMode>,
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

/// Outbound operations the dialogue needs
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Whatever is needed to answer a callback query
    type CallbackHandle: Send + 'static;

    async fn send_text(&self, chat_id: ChatId, text: String, options: SendOptions) -> Result<MessageId, TransportError>;

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        options: EditOptions,
    ) -> Result<(), TransportError>;

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), TransportError>;

    /// Answer a callback query so the client stops its loading indicator
    async fn acknowledge(&self, handle: Self::CallbackHandle) -> Result<(), TransportError>;
}

#[async_trait]
impl Transport for Bot {
    type CallbackHandle = CallbackQuery;

    async fn send_text(&self, chat_id: ChatId, text: String, options: SendOptions) -> Result<MessageId, TransportError> {
        let mut request = self.send_message(chat_id, text);
        if let Some(mode) = options.parse_mode {
            request = request.parse_mode(mode);
        }
        if let Some(markup) = options.reply_markup {
            request = request.reply_markup(markup);
        }
        let message = request.await?;
        Ok(message.id)
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        options: EditOptions,
    ) -> Result<(), TransportError> {
        let mut request = self.edit_message_text(chat_id, message_id, text);
        if let Some(mode) = options.parse_mode {
            request = request.parse_mode(mode);
        }
        if let Some(markup) = options.reply_markup {
            request = request.reply_markup(markup);
        }
        request.await?;
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), TransportError> {
        self.delete_message(chat_id, message_id).await?;
        Ok(())
    }

    async fn acknowledge(&self, handle: CallbackQuery) -> Result<(), TransportError> {
        self.answer_callback_query(handle.id).await?;
        Ok(())
    }
}
