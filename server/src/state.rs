//! Application state shared across request handlers

use std::sync::Arc;

use jobquest_engine::{AssessmentEngine, ChatService, Engagement};
use jobquest_networking::{LanguageModel, LlmClient};
use jobquest_persistence::{Database, InMemorySessionStore};
use tracing::info;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub engagement: Engagement,
    pub chat: ChatService,
}

impl AppState {
    /// Open the database, load the engine configuration and wire components
    pub async fn init(config: &ServerConfig) -> anyhow::Result<Self> {
        let db = Database::connect(&config.db_path).await?;
        info!("Database ready at {}", config.db_path.display());

        let llm: Arc<dyn LanguageModel> = Arc::new(LlmClient::new(config.llm.clone())?);
        Ok(Self::with_parts(db, llm).await?)
    }

    pub async fn with_parts(db: Database, llm: Arc<dyn LanguageModel>) -> jobquest_core::Result<Self> {
        let engine_config = Engagement::load_config(&db).await?;
        let engagement = Engagement::new(db, engine_config.clone());

        let store = Arc::new(InMemorySessionStore::new(
            engine_config.session_ttl(),
            engine_config.max_sessions,
        ));
        let assessment = AssessmentEngine::new(store, llm, engagement.ledger().clone());
        let chat = ChatService::new(assessment, engagement.ledger().clone(), &engine_config);

        Ok(Self { engagement, chat })
    }
}
