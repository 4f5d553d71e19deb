//! JobQuest Engine - streaks, points, badges and the skill-assessment dialogue

pub mod assessment;
pub mod badges;
pub mod chat;
pub mod config;
pub mod engagement;
pub mod ledger;
pub mod messages;
pub mod streak;

pub use assessment::{AssessmentEngine, AssessmentReply};
pub use badges::BadgeIssuer;
pub use chat::{ChatReply, ChatService};
pub use config::{EngineConfig, RewardTable};
pub use engagement::{
    ApplicationOutcome, Engagement, LoginResponse, ProfileStepOutcome, RegisterResponse,
};
pub use ledger::{PointLedger, ReviewOutcome};
pub use streak::{LoginOutcome, StreakTracker};
