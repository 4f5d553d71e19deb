//! Chat entry point
//!
//! Routes one inbound message: rate limit first, then the running
//! assessment session (if any), then keyword intents. Inside a session
//! every message belongs to the session; only a message that is nothing
//! but a cancel keyword ends it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jobquest_core::{calculate_level, AccountId, Result, SessionState};
use jobquest_persistence::TtlCache;
use serde::Serialize;
use tracing::debug;

use crate::assessment::{AssessmentEngine, AssessmentReply};
use crate::config::EngineConfig;
use crate::ledger::PointLedger;

const PRACTICE_INTENTS: &[&str] = &["practicar", "practica", "practice", "evaluación", "evaluacion", "quiz"];
const CANCEL_INTENTS: &[&str] = &["cancelar", "salir", "cancel"];
const GREETING_INTENTS: &[&str] = &["hola", "buenas", "hello", "hi", "hey"];
const POINTS_INTENTS: &[&str] = &["puntos", "points", "nivel", "level", "saldo"];

const RATE_LIMITED_REPLY: &str = "Vas muy rápido 😅 Espera un par de segundos y vuelve a intentarlo.";
const SIGN_IN_REPLY: &str = "Inicia sesión para practicar entrevistas y ganar puntos.";
const GREETING_REPLY: &str =
    "¡Hola! Soy tu asistente de empleo. Escribe \"practicar\" para una evaluación o \"puntos\" para ver tu progreso.";
const HELP_REPLY: &str =
    "Puedo ayudarte a practicar entrevistas (escribe \"practicar\") o mostrarte tus puntos (escribe \"puntos\").";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub session_state: Option<SessionState>,
    pub points_awarded: i64,
    pub rate_limited: bool,
}

impl ChatReply {
    fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            session_state: None,
            points_awarded: 0,
            rate_limited: false,
        }
    }
}

impl From<AssessmentReply> for ChatReply {
    fn from(reply: AssessmentReply) -> Self {
        Self {
            reply: reply.reply,
            session_state: reply.state,
            points_awarded: reply.points_awarded,
            rate_limited: false,
        }
    }
}

#[derive(Clone)]
pub struct ChatService {
    assessment: AssessmentEngine,
    ledger: PointLedger,
    last_seen: Arc<TtlCache<i64, DateTime<Utc>>>,
    min_interval: Duration,
}

impl ChatService {
    pub fn new(assessment: AssessmentEngine, ledger: PointLedger, config: &EngineConfig) -> Self {
        let min_interval = config.chat_min_interval();
        Self {
            assessment,
            ledger,
            last_seen: Arc::new(TtlCache::with_capacity(min_interval, config.max_sessions)),
            min_interval,
        }
    }

    pub async fn handle_message(
        &self,
        account: AccountId,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatReply> {
        if !account.is_guest() {
            if let Some(last) = self.last_seen.get(&account.as_i64(), now) {
                if now - last < self.min_interval {
                    debug!("Rate limited chat message from {}", account);
                    return Ok(ChatReply {
                        rate_limited: true,
                        ..ChatReply::text(RATE_LIMITED_REPLY)
                    });
                }
            }
            self.last_seen.insert(account.as_i64(), now, now);

            if self.assessment.active_session(account, now).await?.is_some() {
                if is_exact_intent(message, CANCEL_INTENTS) {
                    if let Some(reply) = self.assessment.cancel(account, now).await? {
                        return Ok(reply.into());
                    }
                } else if let Some(reply) = self.assessment.handle(account, message, now).await? {
                    return Ok(reply.into());
                }
            }
        }

        if matches_intent(message, PRACTICE_INTENTS) {
            if account.is_guest() {
                return Ok(ChatReply::text(SIGN_IN_REPLY));
            }
            return Ok(self.assessment.start(account, now).await?.into());
        }

        if matches_intent(message, POINTS_INTENTS) {
            if account.is_guest() {
                return Ok(ChatReply::text(SIGN_IN_REPLY));
            }
            let (points, _) = self.ledger.balance(account).await?;
            let level = calculate_level(points);
            return Ok(ChatReply::text(format!(
                "Tienes {} puntos y eres nivel {} {}.",
                points, level.name, level.icon
            )));
        }

        if matches_intent(message, GREETING_INTENTS) {
            return Ok(ChatReply::text(GREETING_REPLY));
        }

        Ok(ChatReply::text(HELP_REPLY))
    }

    /// Evict stale rate-limit entries and idle sessions
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let seen = self.last_seen.cleanup(now);
        let sessions = self.assessment.sweep(now).await?;
        Ok(seen + sessions)
    }
}

/// Whole-word match against any keyword, case-insensitive
fn matches_intent(message: &str, keywords: &[&str]) -> bool {
    let lowered = message.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| keywords.contains(&word))
}

/// The whole message is one keyword, ignoring case and surrounding punctuation
fn is_exact_intent(message: &str, keywords: &[&str]) -> bool {
    let lowered = message.to_lowercase();
    let word = lowered.trim_matches(|c: char| !c.is_alphanumeric());
    keywords.contains(&word)
}
