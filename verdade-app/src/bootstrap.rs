use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use verdade_config::VerdadeConfig;
use verdade_llm::{build_client, ClientSettings};
use verdade_server::AppState;
use verdade_verify::prompt::DEFAULT_SYSTEM_PROMPT;
use verdade_verify::{Verifier, VerifierOptions};

/// Wire the model client and verifier from loaded configuration.
///
/// Without an API key the state carries no verifier and requests are
/// answered according to `server.missing_credentials`.
pub fn build_state(cfg: &VerdadeConfig) -> Result<AppState> {
    let provider = cfg.llm.provider;
    let model = cfg.llm.model();
    let system_prompt = cfg
        .prompt
        .system_prompt()
        .context("failed to resolve system prompt")?
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    let verifier = match cfg.llm.resolved_api_key() {
        Some(api_key) => {
            let settings = ClientSettings {
                provider,
                api_key,
                model: model.clone(),
                endpoint: cfg.llm.endpoint.clone(),
                timeout: Duration::from_secs(cfg.llm.timeout_secs),
                max_retries: cfg.llm.max_retries,
            };
            let client = build_client(&settings)
                .with_context(|| format!("failed to build {provider} client"))?;
            let options = VerifierOptions {
                system_prompt,
                max_tokens: cfg.llm.max_tokens,
                temperature: cfg.llm.temperature,
            };
            Some(Arc::new(Verifier::new(client, options)))
        }
        None => {
            tracing::warn!(
                %provider,
                env = provider.api_key_env(),
                policy = ?cfg.server.missing_credentials,
                "app.no_credentials"
            );
            None
        }
    };

    Ok(AppState {
        verifier,
        provider,
        model,
        missing_credentials: cfg.server.missing_credentials,
        max_upload_bytes: cfg.server.max_upload_bytes,
    })
}
