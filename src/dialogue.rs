//! Conversation mode of a user session.

use serde::{Deserialize, Serialize};

/// Longest product name accepted as a search query
pub const MAX_QUERY_LENGTH: usize = 200;

/// What the bot expects from the user's next free-text message
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    #[default]
    Idle,
    /// The bot asked for a product name to search for
    AwaitingProductName,
    /// The bot asked for a manually typed location
    AwaitingLocation,
}

/// Validates a product name typed by the user
pub fn validate_product_query(query: &str) -> Result<String, &'static str> {
    let trimmed = query.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > MAX_QUERY_LENGTH {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}
