//! HTTP transport for the language-model service

mod client;

pub use client::{LlmClient, LlmConfig};
