use crate::traits::{ContentPart, LlmClient, LlmError, LlmRequest, LlmResponse};
use crate::ClientSettings;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use verdade_common::Provider;
use verdade_http::{header_auth, Auth, HttpClient, RequestOpts};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API client.
pub struct AnthropicClient {
    client: HttpClient,
    auth: Auth<'static>,
    model: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<Block<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

impl AnthropicClient {
    /// Create a client from resolved settings. Fails when the key is unusable.
    pub fn new(settings: &ClientSettings) -> Result<Self, LlmError> {
        let endpoint = settings
            .endpoint
            .as_deref()
            .unwrap_or(Provider::Anthropic.default_endpoint());
        let client = HttpClient::new(&crate::with_trailing_slash(endpoint))?
            .with_timeout(settings.timeout)
            .with_retries(settings.max_retries);
        let auth = header_auth("x-api-key", &settings.api_key)?;

        Ok(Self {
            client,
            auth,
            model: settings.model.clone(),
        })
    }
}

fn to_blocks(parts: &[ContentPart]) -> Vec<Block<'_>> {
    parts
        .iter()
        .map(|part| match part {
            ContentPart::Image(img) => Block::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: img.media_type.as_mime(),
                    data: &img.data,
                },
            },
            ContentPart::Text { text } => Block::Text { text },
        })
        .collect()
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: request.system.as_deref(),
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content: to_blocks(&request.parts),
            }],
        };

        let mut headers = HeaderMap::new();
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        let opts = RequestOpts {
            auth: Some(self.auth.clone()),
            headers: Some(headers),
            ..Default::default()
        };

        tracing::debug!(model=%self.model, parts=request.parts.len(), "anthropic.generate");
        let resp: MessagesResponse = self.client.post_json_opts("messages", &body, opts).await?;

        let text = resp
            .content
            .into_iter()
            .find_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .ok_or_else(|| LlmError::InvalidResponse("no text block in Anthropic response".into()))?;

        let tokens_used = resp.usage.and_then(|u| match (u.input_tokens, u.output_tokens) {
            (None, None) => None,
            (i, o) => Some(i.unwrap_or(0) + o.unwrap_or(0)),
        });

        Ok(LlmResponse {
            text,
            model: resp.model.or_else(|| Some(self.model.clone())),
            tokens_used,
            stop_reason: resp.stop_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }
}
