//! Conversational skill-assessment session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fewest questions a session may ask
pub const MIN_QUESTIONS: usize = 1;
/// Most questions a session may ask
pub const MAX_QUESTIONS: usize = 5;
/// Highest score for one answer
pub const MAX_ANSWER_SCORE: i64 = 50;
/// Shortest accepted skill name (in characters)
pub const MIN_SKILL_LEN: usize = 3;

/// Where the dialogue currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    SelectingSkill,
    SelectingCount,
    Answering,
}

/// Ephemeral per-account dialogue state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSession {
    pub account_id: i64,
    pub state: SessionState,
    pub skill: Option<String>,
    pub questions: Vec<String>,
    pub current_index: usize,
    pub score: i64,
    pub started_at: DateTime<Utc>,
}

impl AssessmentSession {
    pub fn new(account_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            state: SessionState::SelectingSkill,
            skill: None,
            questions: Vec::new(),
            current_index: 0,
            score: 0,
            started_at: now,
        }
    }

    pub fn current_question(&self) -> Option<&str> {
        self.questions.get(self.current_index).map(String::as_str)
    }
}

/// Scored answer as returned by the language model (or its fallback)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    pub score: i64,
    pub feedback: String,
}
