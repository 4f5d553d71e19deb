//! Daily login streak models

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Default reminder time for streak notifications
pub const DEFAULT_NOTIFICATION_TIME: &str = "20:00";

/// Per-account streak state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub account_id: i64,
    pub current_streak: u32,
    /// Never below `current_streak`
    pub best_streak: u32,
    pub last_login: Option<DateTime<Utc>>,
    pub streak_started_at: Option<DateTime<Utc>>,
    pub best_streak_at: Option<DateTime<Utc>>,
    pub total_days: u32,
    pub notifications_enabled: bool,
    pub notification_time: String,
    /// Bumped on every write; compare-and-set guard
    #[serde(skip)]
    pub version: i64,
}

impl StreakRecord {
    /// Record for an account that has never logged in
    pub fn empty(account_id: i64) -> Self {
        Self {
            account_id,
            current_streak: 0,
            best_streak: 0,
            last_login: None,
            streak_started_at: None,
            best_streak_at: None,
            total_days: 0,
            notifications_enabled: false,
            notification_time: DEFAULT_NOTIFICATION_TIME.to_string(),
            version: 0,
        }
    }
}

/// How a login changed the streak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakEvent {
    /// First ever login
    New,
    Incremented,
    /// Same calendar day, nothing changed
    Maintained,
    /// Gap of 24h or more, back to 1
    Reset,
}

/// Parse a strict `HH:MM` reminder time
pub fn parse_notification_time(value: &str) -> crate::Result<NaiveTime> {
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 5
        && bytes[2] == b':'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || b.is_ascii_digit());

    if !well_formed {
        return Err(crate::Error::Validation(format!(
            "notification time '{}' must use HH:MM",
            value
        )));
    }

    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        crate::Error::Validation(format!("notification time '{}' is out of range", value))
    })
}
