//! Chat-completions HTTP client
//!
//! Speaks the widely implemented `POST {base}/chat/completions` shape
//! (system + user message in, `choices[0].message.content` out).

use crate::model::{CompletionRequest, LanguageModel};
use async_trait::async_trait;
use jobquest_core::{Error, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client, Response,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the language-model service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for the language-model service
pub struct LlmClient {
    http: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !self.config.api_key.is_empty() {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|e| Error::InvalidData(format!("invalid API key header: {}", e)))?;
            headers.insert(AUTHORIZATION, bearer);
        }

        Ok(headers)
    }

    /// Check if response indicates authentication failure
    fn check_auth_error(response: &Response) -> Option<Error> {
        match response.status().as_u16() {
            401 | 403 => Some(Error::ApiError("language model rejected the API key".to_string())),
            _ => None,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn chat(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatCompletionBody {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.prompt },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!("Sending completion request ({} prompt chars)", request.prompt.len());

        let response = self
            .http
            .post(self.endpoint())
            .headers(self.default_headers()?)
            .json(&body)
            .send()
            .await?;

        if let Some(err) = Self::check_auth_error(&response) {
            return Err(err);
        }

        let response = response.error_for_status().map_err(|e| {
            error!("Completion request failed: {}", e);
            Error::ApiError(e.to_string())
        })?;

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse completion response: {}", e);
            Error::InvalidData(e.to_string())
        })?;

        let content = first_choice_text(parsed)?;
        debug!("Completion received ({} chars)", content.len());
        Ok(content)
    }
}

fn first_choice_text(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| Error::InvalidData("completion had no text content".to_string()))
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.chat(request).await
    }
}
