//! Engine configuration: reward amounts, limits and time settings
//!
//! Stored as JSON under the `engine_config` settings key. Missing fields
//! fall back to the defaults below.

use chrono::{Duration, FixedOffset, Offset, Utc};
use jobquest_core::ProfileStep;
use serde::{Deserialize, Serialize};

/// Settings key the configuration is stored under
pub const ENGINE_CONFIG_KEY: &str = "engine_config";

/// Points granted per action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RewardTable {
    pub registration: i64,
    pub job_application: i64,
    pub review: i64,
    pub reviews_per_day: u32,
    pub profile_basic_info: i64,
    pub profile_experience: i64,
    pub profile_skills: i64,
    pub profile_preferences: i64,
    /// Bonus booked each time a credit raises the level
    pub level_up: i64,
}

impl RewardTable {
    pub fn profile_step(&self, step: ProfileStep) -> i64 {
        match step {
            ProfileStep::BasicInfo => self.profile_basic_info,
            ProfileStep::Experience => self.profile_experience,
            ProfileStep::Skills => self.profile_skills,
            ProfileStep::Preferences => self.profile_preferences,
        }
    }
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            registration: 100,
            job_application: 10,
            review: 5,
            reviews_per_day: 10,
            profile_basic_info: 50,
            profile_experience: 75,
            profile_skills: 60,
            profile_preferences: 40,
            level_up: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub rewards: RewardTable,
    /// Minimum gap between two chat messages from one account
    pub chat_min_interval_ms: i64,
    /// Idle time after which an assessment session is dropped
    pub session_ttl_secs: i64,
    pub max_sessions: usize,
    /// Offset from UTC, in minutes, used to decide calendar days
    pub day_offset_minutes: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rewards: RewardTable::default(),
            chat_min_interval_ms: 2_000,
            session_ttl_secs: 30 * 60,
            max_sessions: 10_000,
            day_offset_minutes: 0,
        }
    }
}

impl EngineConfig {
    pub fn chat_min_interval(&self) -> Duration {
        Duration::milliseconds(self.chat_min_interval_ms.max(0))
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_secs.max(1))
    }

    /// Timezone for calendar-day decisions; out-of-range offsets mean UTC
    pub fn day_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.day_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}
