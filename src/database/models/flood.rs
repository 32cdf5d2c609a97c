//! Flood settings model.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Per-chat antiflood configuration.
///
/// The live consecutive-message counter is kept in memory by the
/// `FloodGuard`; only the limit is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloodSettings {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Telegram chat ID (indexed)
    pub chat_id: i64,

    /// Consecutive-message limit. 0 disables flood detection.
    #[serde(default)]
    pub limit: u32,
}

impl FloodSettings {
    /// Create settings for a chat with flood detection disabled.
    pub fn new(chat_id: i64) -> Self {
        Self {
            id: None,
            chat_id,
            limit: 0,
        }
    }

    /// Whether flood detection is active for this chat.
    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_settings_are_disabled() {
        let settings = FloodSettings::new(-100);
        assert_eq!(settings.limit, 0);
        assert!(!settings.is_enabled());
    }
}
