//! JobQuest Networking - language-model HTTP client and request contract

pub mod http;
pub mod model;

pub use http::{LlmClient, LlmConfig};
pub use model::{CompletionRequest, LanguageModel};
