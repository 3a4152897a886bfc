//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Dispatcher endpoint for text, location and other messages
//! - `callback_handler`: Dispatcher endpoint for inline keyboard callback queries
//! - `dialogue_manager`: Session state machine behind both endpoints
//! - `card_renderer`: Sends or edits the product card of a session
//! - `ui_builder`: Creates keyboards and formats messages
//! - `transport`: Outbound messaging seam over the Telegram API

pub mod callback_handler;
pub mod card_renderer;
pub mod dialogue_manager;
pub mod message_handler;
pub mod transport;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use card_renderer::{present_card, CardRefresh, RenderOutcome};
pub use dialogue_manager::{CallbackEvent, DialogueManager};
pub use transport::{EditOptions, SendOptions, Transport, TransportError};
