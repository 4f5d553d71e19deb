//! Badge models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Achievements known to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeType {
    /// Profile reached 100% completion
    ProfileComplete,
    /// Five consecutive days logged in
    FiveDayStreak,
    /// First job application sent
    FirstApplication,
}

/// Static description of a badge type
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDescriptor {
    pub badge_type: BadgeType,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    /// Points credited when first obtained
    pub bonus: i64,
}

impl BadgeType {
    pub const ALL: [BadgeType; 3] = [
        BadgeType::ProfileComplete,
        BadgeType::FiveDayStreak,
        BadgeType::FirstApplication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeType::ProfileComplete => "profile_complete",
            BadgeType::FiveDayStreak => "five_day_streak",
            BadgeType::FirstApplication => "first_application",
        }
    }

    pub fn parse(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| crate::Error::Validation(format!("unknown badge type '{}'", s)))
    }

    pub fn descriptor(&self) -> BadgeDescriptor {
        match self {
            BadgeType::ProfileComplete => BadgeDescriptor {
                badge_type: *self,
                title: "Perfil Completo",
                description: "Completaste el 100% de tu perfil",
                icon: "🏅",
                bonus: 100,
            },
            BadgeType::FiveDayStreak => BadgeDescriptor {
                badge_type: *self,
                title: "5 Days Active",
                description: "Iniciaste sesión 5 días seguidos",
                icon: "🔥",
                bonus: 50,
            },
            BadgeType::FirstApplication => BadgeDescriptor {
                badge_type: *self,
                title: "Primera Postulación",
                description: "Enviaste tu primera postulación",
                icon: "📨",
                bonus: 50,
            },
        }
    }
}

/// Stored badge state for one (account, badge type) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeRecord {
    pub id: i64,
    pub account_id: i64,
    pub badge_type: String,
    pub description: String,
    pub icon: String,
    /// false -> true once, never back
    pub obtained: bool,
    pub obtained_at: Option<DateTime<Utc>>,
    /// Whether the client has been told; independent of `obtained`
    pub notification_sent: bool,
}

/// Result of an ensure-awarded call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeAward {
    pub already_held: bool,
    pub newly_awarded: bool,
    pub badge: Option<BadgeRecord>,
}
