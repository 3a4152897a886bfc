//! Card Renderer module: shows the current product as one message per session
//!
//! The session's `last_card` is the only renderer state. With no previous
//! card a new message is sent; otherwise the previous card is edited in
//! place, falling back to a fresh message when the edit is rejected. A new
//! result set, or an event from a different chat than the one holding the
//! card, replaces the old card by delete-then-send.

use teloxide::types::{ChatId, MessageId, ParseMode};
use tracing::{debug, warn};

use super::transport::{EditOptions, SendOptions, Transport, TransportError};
use super::ui_builder::{build_product_card, CardView};
use crate::session::{CardRef, Session};

/// How the card is being refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardRefresh {
    /// A fresh search replaced the result set
    NewResults,
    /// Paging or sorting within the current result set
    InPlace,
}

/// What the renderer did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Sent(MessageId),
    Edited(MessageId),
    /// The previous card already showed this content
    Unchanged(MessageId),
    /// Nothing to show; no request was made
    Empty,
}

async fn send_card<T: Transport + ?Sized>(
    transport: &T,
    chat_id: ChatId,
    session: &mut Session,
    view: CardView,
) -> Result<MessageId, TransportError> {
    let options = SendOptions::html().with_markup(view.keyboard);
    let message_id = transport.send_text(chat_id, view.text, options).await?;
    session.last_card = Some(CardRef { chat_id, message_id });
    Ok(message_id)
}

async fn delete_card<T: Transport + ?Sized>(transport: &T, session: &Session, card: CardRef) {
    if let Err(e) = transport.delete(card.chat_id, card.message_id).await {
        debug!(
            user_id = %session.user_id,
            chat_id = %card.chat_id,
            error = %e,
            "Previous card could not be deleted"
        );
    }
}

/// Render the session's current product in `chat_id`, creating or updating its card
pub async fn present_card<T: Transport + ?Sized>(
    transport: &T,
    chat_id: ChatId,
    session: &mut Session,
    refresh: CardRefresh,
) -> Result<RenderOutcome, TransportError> {
    let Some(view) = build_product_card(&session.results, &session.language) else {
        debug!(user_id = %session.user_id, "No product to render");
        return Ok(RenderOutcome::Empty);
    };

    let Some(previous) = session.last_card else {
        let message_id = send_card(transport, chat_id, session, view).await?;
        return Ok(RenderOutcome::Sent(message_id));
    };

    if refresh == CardRefresh::NewResults || previous.chat_id != chat_id {
        delete_card(transport, session, previous).await;
        session.last_card = None;

        let message_id = send_card(transport, chat_id, session, view).await?;
        return Ok(RenderOutcome::Sent(message_id));
    }

    let options = EditOptions {
        parse_mode: Some(ParseMode::Html),
        reply_markup: Some(view.keyboard.clone()),
    };

    match transport
        .edit_text(previous.chat_id, previous.message_id, view.text.clone(), options)
        .await
    {
        Ok(()) => Ok(RenderOutcome::Edited(previous.message_id)),
        Err(TransportError::NotModified) => Ok(RenderOutcome::Unchanged(previous.message_id)),
        Err(e) => {
            warn!(
                user_id = %session.user_id,
                error = %e,
                "Card edit failed, sending a new card"
            );
            let message_id = send_card(transport, chat_id, session, view).await?;

            // The old card may still be visible if the edit was only rejected
            delete_card(transport, session, previous).await;
            Ok(RenderOutcome::Sent(message_id))
        }
    }
}
