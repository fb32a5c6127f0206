use std::sync::Arc;

use verdade_llm::traits::LlmClient;

use crate::error::Result;
use crate::normalize::normalize;
use crate::prompt::{build_prompt, DEFAULT_SYSTEM_PROMPT};
use crate::types::{Verdict, VerdictRecord, VerificationRequest};

/// Generation knobs applied to every verification call.
#[derive(Debug, Clone)]
pub struct VerifierOptions {
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: 1024,
            temperature: None,
        }
    }
}

/// Runs one verification: prompt, upstream call, normalization.
pub struct Verifier {
    llm: Arc<dyn LlmClient + Send + Sync>,
    options: VerifierOptions,
}

impl Verifier {
    pub fn new(llm: Arc<dyn LlmClient + Send + Sync>, options: VerifierOptions) -> Self {
        Self { llm, options }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Upstream failures are returned as errors; malformed output is not.
    pub async fn verify(&self, request: &VerificationRequest) -> Result<VerdictRecord> {
        let payload = build_prompt(request, &self.options.system_prompt);
        let llm_request =
            payload.into_request(Some(self.options.max_tokens), self.options.temperature);

        tracing::debug!(
            provider=%self.llm.provider(),
            model=%self.llm.model_name(),
            kind=?request.kind(),
            has_text=request.text().is_some(),
            has_image=request.image().is_some(),
            "verify.calling_upstream"
        );

        let response = self.llm.generate(&llm_request).await?;

        tracing::debug!(
            tokens_used=?response.tokens_used,
            stop_reason=?response.stop_reason,
            text_len=response.text.len(),
            "verify.normalizing_response"
        );

        Ok(normalize(&response.text))
    }
}

/// Record returned in place of a verdict when no API key is configured and
/// the server runs in demo mode.
pub fn demo_record() -> VerdictRecord {
    VerdictRecord {
        verdict: Verdict::Unverified,
        confidence: 0,
        summary: "API não configurada. Configure a chave de API para usar o verificador.".into(),
        explanation: "Esta é uma resposta de demonstração. Para verificações reais, \
                      adicione a chave de API do provedor nas variáveis de ambiente."
            .into(),
        sources_consulted: vec!["Nenhuma - modo demo".into()],
        tips: vec!["Configure a chave de API seguindo as instruções do README.".into()],
        legal_context: None,
        demo_mode: true,
    }
}
