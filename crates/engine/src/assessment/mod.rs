//! Conversational skill assessment
//!
//! A per-account state machine: pick a skill, pick how many questions,
//! then answer them one by one. Every answer is scored by the language
//! model (or a fixed fallback) and credited right away, so leaving a
//! session early keeps whatever was already earned.

pub mod parse;
pub mod prompts;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jobquest_core::{
    AccountId, AnswerEvaluation, AssessmentSession, Error, PointSource, Result, SessionState,
    MAX_QUESTIONS, MIN_QUESTIONS, MIN_SKILL_LEN,
};
use jobquest_networking::LanguageModel;
use jobquest_persistence::SessionStore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ledger::PointLedger;

/// What the engine has to say after one message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentReply {
    pub reply: String,
    /// State after this turn, `None` once the session is gone
    pub state: Option<SessionState>,
    pub points_awarded: i64,
    pub completed: bool,
    pub session_total: Option<i64>,
}

impl AssessmentReply {
    fn prompt(reply: impl Into<String>, state: SessionState) -> Self {
        Self {
            reply: reply.into(),
            state: Some(state),
            points_awarded: 0,
            completed: false,
            session_total: None,
        }
    }
}

#[derive(Clone)]
pub struct AssessmentEngine {
    store: Arc<dyn SessionStore>,
    llm: Arc<dyn LanguageModel>,
    ledger: PointLedger,
}

impl AssessmentEngine {
    pub fn new(store: Arc<dyn SessionStore>, llm: Arc<dyn LanguageModel>, ledger: PointLedger) -> Self {
        Self { store, llm, ledger }
    }

    /// Open a fresh session, replacing any session already in progress
    pub async fn start(&self, account: AccountId, now: DateTime<Utc>) -> Result<AssessmentReply> {
        reject_guest(account)?;

        self.store
            .save(AssessmentSession::new(account.as_i64(), now), now)
            .await?;
        info!("Assessment session started for {}", account);

        Ok(AssessmentReply::prompt(
            "¡Vamos a practicar! ¿Qué habilidad quieres evaluar? (por ejemplo: SQL, Excel, atención al cliente)",
            SessionState::SelectingSkill,
        ))
    }

    pub async fn active_session(
        &self,
        account: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Option<AssessmentSession>> {
        if account.is_guest() {
            return Ok(None);
        }
        self.store.load(account.as_i64(), now).await
    }

    /// Evict sessions idle past their TTL
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        self.store.sweep(now).await
    }

    /// Drop the session. Points already credited stay.
    pub async fn cancel(&self, account: AccountId, now: DateTime<Utc>) -> Result<Option<AssessmentReply>> {
        let Some(session) = self.active_session(account, now).await? else {
            return Ok(None);
        };
        self.store.delete(account.as_i64()).await?;
        info!(
            "Assessment session cancelled for {} after {} answers",
            account, session.current_index
        );

        Ok(Some(AssessmentReply {
            reply: format!(
                "Sesión terminada. Conservas los {} puntos que ganaste. ¡Vuelve cuando quieras!",
                session.score
            ),
            state: None,
            points_awarded: 0,
            completed: false,
            session_total: Some(session.score),
        }))
    }

    /// Feed one message into the session.
    ///
    /// Returns `None` when the account has no session in progress.
    pub async fn handle(
        &self,
        account: AccountId,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AssessmentReply>> {
        reject_guest(account)?;

        let Some(session) = self.store.load(account.as_i64(), now).await? else {
            return Ok(None);
        };

        let reply = match session.state {
            SessionState::SelectingSkill => self.choose_skill(session, message, now).await?,
            SessionState::SelectingCount => self.choose_count(session, message, now).await?,
            SessionState::Answering => self.answer(account, session, message, now).await?,
        };
        Ok(Some(reply))
    }

    async fn choose_skill(
        &self,
        mut session: AssessmentSession,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<AssessmentReply> {
        let skill = message.trim();
        if skill.chars().count() < MIN_SKILL_LEN {
            // Re-prompting still counts as activity
            self.store.save(session, now).await?;
            return Ok(AssessmentReply::prompt(
                format!(
                    "Escribe el nombre de la habilidad (al menos {} letras).",
                    MIN_SKILL_LEN
                ),
                SessionState::SelectingSkill,
            ));
        }

        session.skill = Some(skill.to_string());
        session.state = SessionState::SelectingCount;
        self.store.save(session, now).await?;

        Ok(AssessmentReply::prompt(
            format!(
                "Perfecto, practicaremos {}. ¿Cuántas preguntas quieres? ({} a {})",
                skill, MIN_QUESTIONS, MAX_QUESTIONS
            ),
            SessionState::SelectingCount,
        ))
    }

    async fn choose_count(
        &self,
        mut session: AssessmentSession,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<AssessmentReply> {
        let count = match parse_count(message) {
            Some(count) => count,
            None => {
                self.store.save(session, now).await?;
                return Ok(AssessmentReply::prompt(
                    format!("Elige un número entre {} y {}.", MIN_QUESTIONS, MAX_QUESTIONS),
                    SessionState::SelectingCount,
                ))
            }
        };

        let skill = session.skill.clone().unwrap_or_default();
        let questions = self.generate_questions(&skill, count).await;

        session.questions = questions;
        session.current_index = 0;
        session.score = 0;
        session.state = SessionState::Answering;

        let first = session.current_question().unwrap_or_default().to_string();
        self.store.save(session, now).await?;

        Ok(AssessmentReply::prompt(
            format!("Pregunta 1 de {}:\n{}", count, first),
            SessionState::Answering,
        ))
    }

    async fn answer(
        &self,
        account: AccountId,
        mut session: AssessmentSession,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<AssessmentReply> {
        let skill = session.skill.clone().unwrap_or_default();
        let question = session.current_question().unwrap_or_default().to_string();
        let evaluation = self.evaluate(&skill, &question, message.trim()).await;

        session.score += evaluation.score;
        session.current_index += 1;
        let total = session.questions.len();
        let session_total = session.score;
        let next = session.current_question().map(str::to_string);
        let number = session.current_index + 1;

        // Session state is settled before crediting so a failed credit
        // never replays the same answer.
        if next.is_some() {
            self.store.save(session, now).await?;
        } else {
            self.store.delete(account.as_i64()).await?;
        }

        let mut reply = format!("{} (+{} puntos)", evaluation.feedback, evaluation.score);
        if evaluation.score > 0 {
            let credit = self
                .ledger
                .award(account, evaluation.score, PointSource::Assessment)
                .await?;
            if credit.leveled_up {
                if let Some(level) = jobquest_core::level_info(credit.new_level) {
                    let note = crate::messages::level_up_message(level, &mut rand::thread_rng());
                    reply.push('\n');
                    reply.push_str(&note);
                }
            }
        }

        match next {
            Some(question) => {
                reply.push_str(&format!("\n\nPregunta {} de {}:\n{}", number, total, question));
                Ok(AssessmentReply {
                    reply,
                    state: Some(SessionState::Answering),
                    points_awarded: evaluation.score,
                    completed: false,
                    session_total: None,
                })
            }
            None => {
                info!(
                    "Assessment finished for {}: {} points over {} questions",
                    account, session_total, total
                );
                reply.push_str(&format!(
                    "\n\n¡Terminaste! Obtuviste {} puntos en total.",
                    session_total
                ));
                Ok(AssessmentReply {
                    reply,
                    state: None,
                    points_awarded: evaluation.score,
                    completed: true,
                    session_total: Some(session_total),
                })
            }
        }
    }

    async fn generate_questions(&self, skill: &str, count: usize) -> Vec<String> {
        match self.llm.complete(&prompts::question_request(skill, count)).await {
            Ok(text) => match parse::parse_questions(&text, count) {
                Some(questions) => return questions,
                None => warn!("Could not parse {} questions for '{}', using templates", count, skill),
            },
            Err(e) => warn!("Question generation failed for '{}': {}", skill, e),
        }

        let mut questions = prompts::fallback_questions(skill);
        questions.truncate(count);
        questions
    }

    async fn evaluate(&self, skill: &str, question: &str, answer: &str) -> AnswerEvaluation {
        match self
            .llm
            .complete(&prompts::scoring_request(skill, question, answer))
            .await
        {
            Ok(text) => parse::parse_evaluation(&text).unwrap_or_else(|| {
                debug!("Unparseable evaluation, using fallback score");
                prompts::fallback_evaluation()
            }),
            Err(e) => {
                warn!("Answer scoring failed: {}", e);
                prompts::fallback_evaluation()
            }
        }
    }
}

fn reject_guest(account: AccountId) -> Result<()> {
    if account.is_guest() {
        return Err(Error::Validation(
            "assessment sessions require a signed-in account".to_string(),
        ));
    }
    Ok(())
}

/// Integer in the allowed range, written alone or as the first word
fn parse_count(message: &str) -> Option<usize> {
    message
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_ascii_digit())
        .parse::<usize>()
        .ok()
        .filter(|n| (MIN_QUESTIONS..=MAX_QUESTIONS).contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jobquest_core::NewAccount;
    use jobquest_networking::CompletionRequest;
    use jobquest_persistence::{sqlite, Database, InMemorySessionStore};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions in order, then fails
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::NetworkError("script exhausted".into())))
        }
    }

    async fn setup(replies: Vec<Result<String>>) -> (AssessmentEngine, PointLedger, AccountId) {
        let db = Database::connect_in_memory().await.unwrap();
        let id = sqlite::create_account(
            db.pool(),
            &NewAccount {
                name: "Iván".into(),
                email: "ivan@example.com".into(),
                password: "x".into(),
            },
        )
        .await
        .unwrap();
        let ledger = PointLedger::new(db);
        let engine = AssessmentEngine::new(
            Arc::new(InMemorySessionStore::default()),
            ScriptedModel::new(replies),
            ledger.clone(),
        );
        (engine, ledger, AccountId(id))
    }

    #[tokio::test]
    async fn test_full_session_with_model() {
        let (engine, ledger, account) = setup(vec![
            Ok(r#"{"questions": ["¿Qué es un JOIN?", "¿Qué es un índice?"]}"#.into()),
            Ok(r#"{"score": 40, "feedback": "Bien explicado"}"#.into()),
            Ok("```json\n{\"score\": 30, \"feedback\": \"Correcto\"}\n```".into()),
        ])
        .await;
        let now = Utc::now();

        let reply = engine.start(account, now).await.unwrap();
        assert_eq!(reply.state, Some(SessionState::SelectingSkill));

        let reply = engine.handle(account, "ab", now).await.unwrap().unwrap();
        assert_eq!(reply.state, Some(SessionState::SelectingSkill));

        let reply = engine.handle(account, "  SQL  ", now).await.unwrap().unwrap();
        assert_eq!(reply.state, Some(SessionState::SelectingCount));

        let reply = engine.handle(account, "7", now).await.unwrap().unwrap();
        assert_eq!(reply.state, Some(SessionState::SelectingCount));

        let reply = engine.handle(account, "2", now).await.unwrap().unwrap();
        assert_eq!(reply.state, Some(SessionState::Answering));
        assert!(reply.reply.contains("¿Qué es un JOIN?"));

        let reply = engine.handle(account, "Une tablas", now).await.unwrap().unwrap();
        assert_eq!(reply.points_awarded, 40);
        assert!(!reply.completed);
        assert!(reply.reply.contains("¿Qué es un índice?"));

        let reply = engine.handle(account, "Acelera búsquedas", now).await.unwrap().unwrap();
        assert!(reply.completed);
        assert_eq!(reply.state, None);
        assert_eq!(reply.session_total, Some(70));

        assert_eq!(ledger.balance(account).await.unwrap().0, 70);
        assert!(engine.handle(account, "hola", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_model_failure_uses_templates_and_fallback_score() {
        let (engine, ledger, account) = setup(vec![Ok("no puedo ayudar con eso".into())]).await;
        let now = Utc::now();

        engine.start(account, now).await.unwrap();
        engine.handle(account, "Excel", now).await.unwrap();
        engine.handle(account, "3", now).await.unwrap();

        let session = engine.active_session(account, now).await.unwrap().unwrap();
        assert_eq!(session.questions.len(), 3);
        assert!(session.questions.iter().all(|q| q.contains("Excel")));

        let reply = engine.handle(account, "Uso tablas dinámicas", now).await.unwrap().unwrap();
        assert_eq!(reply.points_awarded, prompts::FALLBACK_SCORE);
        assert_eq!(ledger.balance(account).await.unwrap().0, prompts::FALLBACK_SCORE);
    }

    #[tokio::test]
    async fn test_abandoned_session_keeps_earned_points() {
        let (engine, ledger, account) = setup(vec![
            Ok(r#"["P1", "P2", "P3"]"#.into()),
            Ok(r#"{"score": 20, "feedback": "ok"}"#.into()),
            Ok(r#"{"score": 35, "feedback": "ok"}"#.into()),
        ])
        .await;
        let now = Utc::now();

        engine.start(account, now).await.unwrap();
        engine.handle(account, "Python", now).await.unwrap();
        engine.handle(account, "3", now).await.unwrap();
        engine.handle(account, "respuesta uno", now).await.unwrap();
        engine.handle(account, "respuesta dos", now).await.unwrap();

        let cancelled = engine.cancel(account, now).await.unwrap().unwrap();
        assert_eq!(cancelled.session_total, Some(55));
        assert!(engine.active_session(account, now).await.unwrap().is_none());

        assert_eq!(ledger.balance(account).await.unwrap().0, 55);
    }

    #[tokio::test]
    async fn test_expired_session_is_gone() {
        let (engine, _ledger, account) = setup(vec![]).await;
        let now = Utc::now();

        engine.start(account, now).await.unwrap();
        let later = now + chrono::Duration::hours(2);
        assert!(engine.handle(account, "Rust", later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reprompts_keep_session_alive() {
        let (engine, _ledger, account) = setup(vec![]).await;
        let start = Utc::now();
        let minutes = |m| start + chrono::Duration::minutes(m);

        // Default idle limit is 30 minutes; each re-prompt restarts it
        engine.start(account, start).await.unwrap();
        let reply = engine.handle(account, "ab", minutes(20)).await.unwrap().unwrap();
        assert_eq!(reply.state, Some(SessionState::SelectingSkill));

        let reply = engine.handle(account, "Rust", minutes(40)).await.unwrap().unwrap();
        assert_eq!(reply.state, Some(SessionState::SelectingCount));

        let reply = engine.handle(account, "muchas", minutes(60)).await.unwrap().unwrap();
        assert_eq!(reply.state, Some(SessionState::SelectingCount));

        let reply = engine.handle(account, "2", minutes(80)).await.unwrap().unwrap();
        assert_eq!(reply.state, Some(SessionState::Answering));
    }

    #[tokio::test]
    async fn test_guest_is_rejected() {
        let (engine, _ledger, _account) = setup(vec![]).await;
        let now = Utc::now();

        assert!(matches!(
            engine.start(AccountId::GUEST, now).await,
            Err(Error::Validation(_))
        ));
        assert!(engine.active_session(AccountId::GUEST, now).await.unwrap().is_none());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("3"), Some(3));
        assert_eq!(parse_count(" 5 preguntas"), Some(5));
        assert_eq!(parse_count("0"), None);
        assert_eq!(parse_count("6"), None);
        assert_eq!(parse_count("tres"), None);
    }
}
