//! Provider-agnostic LLM integration for Verdade.
//!
//! This crate exposes a common [`traits::LlmClient`] interface over multimodal,
//! single-turn requests and concrete provider implementations for Anthropic
//! and Gemini. [`build_client`] turns resolved [`ClientSettings`] into a
//! shareable client.
//!
//! # Examples
//! ```no_run
//! use verdade_common::Provider;
//! use verdade_llm::{build_client, ClientSettings};
//!
//! let settings = ClientSettings::new(Provider::Anthropic, "sk-ant-...");
//! let client = build_client(&settings).expect("valid settings");
//! assert_eq!(client.model_name(), Provider::Anthropic.default_model());
//! ```
pub mod anthropic;
pub mod gemini;
pub mod traits;

use anthropic::AnthropicClient;
use gemini::GeminiClient;
use std::sync::Arc;
use std::time::Duration;
use traits::{LlmClient, LlmError};
use verdade_common::Provider;

/// Everything needed to construct a provider client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    /// Override for the provider's base URL (gateways, tests).
    pub endpoint: Option<String>,
    pub timeout: Duration,
    pub max_retries: usize,
}

impl ClientSettings {
    /// Settings with the provider's default model and endpoint.
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: provider.default_model().to_string(),
            endpoint: None,
            timeout: Duration::from_secs(60),
            max_retries: 1,
        }
    }
}

/// Build the client for the configured provider.
pub fn build_client(
    settings: &ClientSettings,
) -> Result<Arc<dyn LlmClient + Send + Sync + 'static>, LlmError> {
    match settings.provider {
        Provider::Anthropic => Ok(Arc::new(AnthropicClient::new(settings)?)),
        Provider::Gemini => Ok(Arc::new(GeminiClient::new(settings)?)),
    }
}

pub(crate) fn with_trailing_slash(endpoint: &str) -> String {
    if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{endpoint}/")
    }
}
