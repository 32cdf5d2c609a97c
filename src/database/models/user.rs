//! User data model.
//!
//! Stores user identity from Telegram plus the embedded AFK state.

use serde::{Deserialize, Serialize};
use teloxide::types::User;

/// Tracked user data from Telegram + AFK state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRecord {
    /// Telegram user ID.
    pub user_id: u64,
    /// Username without @ (lowercase for matching).
    pub username: Option<String>,
    /// Original username (preserving case for display).
    pub username_display: Option<String>,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: Option<String>,
    /// Unix timestamp of last update.
    pub updated_at: i64,

    // --- Embedded AFK state ---
    /// Whether the user is currently away. Absence of a record means
    /// "not away", so this defaults to false.
    #[serde(default)]
    pub is_afk: bool,

    /// Reason for being away. None when no reason was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afk_reason: Option<String>,

    /// Unix timestamp of when the user went away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afk_since: Option<i64>,
}

impl UserRecord {
    /// Create a new UserRecord from a Telegram User.
    pub fn from_telegram(user: &User) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            user_id: user.id.0,
            username: user.username.as_ref().map(|u| u.to_lowercase()),
            username_display: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            updated_at: now,
            is_afk: false,
            afk_reason: None,
            afk_since: None,
        }
    }

    /// Check whether identity fields differ from a Telegram User.
    /// Used to skip unnecessary writes on upsert.
    pub fn has_changed(&self, user: &User) -> bool {
        self.username != user.username.as_ref().map(|u| u.to_lowercase())
            || self.first_name != user.first_name
            || self.last_name != user.last_name
    }

    /// Mark the user as away, overwriting any previous AFK state.
    pub fn set_afk(&mut self, reason: Option<String>) {
        self.is_afk = true;
        self.afk_reason = reason.filter(|r| !r.is_empty());
        self.afk_since = Some(chrono::Utc::now().timestamp());
    }

    /// Clear the AFK state. Returns true if the user was away.
    pub fn clear_afk(&mut self) -> bool {
        let was_afk = self.is_afk;
        self.is_afk = false;
        self.afk_reason = None;
        self.afk_since = None;
        was_afk
    }

    /// Seconds since the user went away.
    pub fn afk_duration_secs(&self) -> u64 {
        self.afk_since
            .map(|t| (chrono::Utc::now().timestamp() - t).max(0) as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: u64) -> UserRecord {
        UserRecord {
            user_id,
            username: Some("tester".to_string()),
            username_display: Some("Tester".to_string()),
            first_name: "Test".to_string(),
            last_name: None,
            updated_at: 0,
            is_afk: false,
            afk_reason: None,
            afk_since: None,
        }
    }

    #[test]
    fn test_clear_afk_returns_true_exactly_once() {
        let mut user = record(1);
        user.set_afk(Some("lunch".to_string()));

        assert!(user.clear_afk());
        assert!(!user.clear_afk());
        assert!(!user.clear_afk());

        user.set_afk(None);
        assert!(user.clear_afk());
    }

    #[test]
    fn test_set_afk_overwrites_previous_state() {
        let mut user = record(1);
        user.set_afk(Some("first".to_string()));
        user.set_afk(Some("second".to_string()));

        assert!(user.is_afk);
        assert_eq!(user.afk_reason.as_deref(), Some("second"));
    }

    #[test]
    fn test_empty_reason_is_stored_as_none() {
        let mut user = record(1);
        user.set_afk(Some(String::new()));

        assert!(user.is_afk);
        assert!(user.afk_reason.is_none());
    }

    #[test]
    fn test_clear_afk_drops_reason_and_timestamp() {
        let mut user = record(1);
        user.set_afk(Some("bbl".to_string()));
        user.clear_afk();

        assert!(user.afk_reason.is_none());
        assert!(user.afk_since.is_none());
    }
}
