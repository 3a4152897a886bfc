//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;

use super::dialogue_manager::{CallbackEvent, DialogueManager};

/// Handle callback queries from inline keyboards
pub async fn callback_handler(q: CallbackQuery, manager: Arc<DialogueManager<Bot>>) -> Result<()> {
    let user_id = q.from.id;
    let chat_id = q.message.as_ref().map(|msg| msg.chat().id);
    let data = q.data.clone();

    manager
        .on_callback(CallbackEvent {
            handle: q,
            user_id,
            chat_id,
            data,
        })
        .await;

    Ok(())
}
