//! Point ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointTransaction {
    pub id: i64,
    pub account_id: i64,
    pub delta: i64,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a level recomputation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelChange {
    pub previous_level: u32,
    pub new_level: u32,
    pub leveled_up: bool,
    pub level_info: crate::LevelDefinition,
}

/// Combined answer for "credit points then recompute level"
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditOutcome {
    pub points_granted: i64,
    pub new_total: i64,
    pub previous_level: u32,
    pub new_level: u32,
    pub leveled_up: bool,
    /// Extra points booked because this credit raised the level
    pub level_bonus: i64,
}

impl CreditOutcome {
    pub fn new(points_granted: i64, new_total: i64, change: &LevelChange) -> Self {
        Self {
            points_granted,
            new_total,
            previous_level: change.previous_level,
            new_level: change.new_level,
            leveled_up: change.leveled_up,
            level_bonus: 0,
        }
    }

    /// Outcome for calls that changed nothing (guests, rejected reviews)
    pub fn unchanged(total: i64, level: u32) -> Self {
        Self {
            points_granted: 0,
            new_total: total,
            previous_level: level,
            new_level: level,
            leveled_up: false,
            level_bonus: 0,
        }
    }
}
