//! Request/response contract with the language-model service
//!
//! The engine only ever sees raw completion text. Whatever comes back is
//! untrusted and parsed defensively by the caller.

use async_trait::async_trait;
use jobquest_core::Result;
use serde::{Deserialize, Serialize};

/// One prompt sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: 600,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Anything that can turn a prompt into completion text
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
