//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

use crate::geocoder::Coordinates;

use super::dialogue_manager::DialogueManager;

/// Dispatcher endpoint for every incoming message
pub async fn message_handler(msg: Message, manager: Arc<DialogueManager<Bot>>) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without a sender");
        return Ok(());
    };
    let user_id = user.id;
    let chat_id = msg.chat.id;

    if let Some(text) = msg.text() {
        manager.on_text(user_id, chat_id, text).await;
    } else if let Some(location) = msg.location() {
        let coordinates = Coordinates::new(location.latitude, location.longitude);
        manager.on_location(user_id, chat_id, coordinates).await;
    } else {
        manager.on_unsupported(user_id, chat_id).await;
    }

    Ok(())
}
