use crate::traits::{ContentPart, LlmClient, LlmError, LlmRequest, LlmResponse};
use crate::ClientSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use verdade_common::Provider;
use verdade_http::{Auth, HttpClient, RequestOpts};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    safety_settings: Vec<GeminiSafetySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum GeminiPart<'a> {
    Text(&'a str),
    InlineData(GeminiBlob<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct GeminiSafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

/// Google Gemini `generateContent` client.
///
/// Requires a valid API key and internet access.
pub struct GeminiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, LlmError> {
        if settings.api_key.trim().is_empty() {
            return Err(LlmError::Config("Gemini API key is empty".into()));
        }
        let endpoint = settings
            .endpoint
            .as_deref()
            .unwrap_or(Provider::Gemini.default_endpoint());
        let client = HttpClient::new(&crate::with_trailing_slash(endpoint))?
            .with_timeout(settings.timeout)
            .with_retries(settings.max_retries);

        Ok(Self {
            client,
            api_key: settings.api_key.trim().to_string(),
            model: settings.model.clone(),
        })
    }

    fn safety_settings() -> Vec<GeminiSafetySetting> {
        [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ]
        .into_iter()
        .map(|category| GeminiSafetySetting {
            category,
            threshold: "BLOCK_ONLY_HIGH",
        })
        .collect()
    }
}

fn to_parts(parts: &[ContentPart]) -> Vec<GeminiPart<'_>> {
    parts
        .iter()
        .map(|part| match part {
            ContentPart::Image(img) => GeminiPart::InlineData(GeminiBlob {
                mime_type: img.media_type.as_mime(),
                data: &img.data,
            }),
            ContentPart::Text { text } => GeminiPart::Text(text),
        })
        .collect()
}

fn first_text(resp: GeminiResponse) -> Result<(String, Option<String>, Option<u32>), LlmError> {
    let tokens = resp.usage_metadata.and_then(|u| u.total_token_count);

    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".into());
        return Err(LlmError::Blocked(reason));
    };

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(LlmError::Blocked("SAFETY".into()));
    }

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .filter(|t| !t.is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("no text parts in Gemini response".into()))?;

    Ok((text, candidate.finish_reason, tokens))
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let path = format!("models/{}:generateContent", self.model);

        let generation_config = if request.max_tokens.is_some() || request.temperature.is_some() {
            Some(GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            })
        } else {
            None
        };

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: to_parts(&request.parts),
            }],
            generation_config,
            safety_settings: Self::safety_settings(),
            system_instruction: request.system.as_deref().map(|sys| GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text(sys)],
            }),
        };

        let opts = RequestOpts {
            auth: Some(Auth::Query {
                name: "key",
                value: Cow::Borrowed(self.api_key.as_str()),
            }),
            ..Default::default()
        };

        tracing::debug!(model=%self.model, parts=request.parts.len(), "gemini.generate");
        let resp: GeminiResponse = self.client.post_json_opts(&path, &body, opts).await?;
        let model = resp.model_version.clone().or_else(|| Some(self.model.clone()));
        let (text, stop_reason, tokens_used) = first_text(resp)?;

        Ok(LlmResponse {
            text,
            model,
            tokens_used,
            stop_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> Provider {
        Provider::Gemini
    }
}
