use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use verdade_common::Provider;
use verdade_http::HttpError;

/// Image formats the upstream models accept as inline attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageMediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "image/webp")]
    Webp,
}

impl ImageMediaType {
    /// Map a declared MIME type onto an accepted one.
    ///
    /// Anything unrecognised (including a missing type) is tagged as JPEG;
    /// the upstream model sniffs the bytes anyway.
    ///
    /// ```
    /// use verdade_llm::traits::ImageMediaType;
    ///
    /// assert_eq!(ImageMediaType::from_mime(Some("image/png")), ImageMediaType::Png);
    /// assert_eq!(ImageMediaType::from_mime(Some("image/bmp")), ImageMediaType::Jpeg);
    /// assert_eq!(ImageMediaType::from_mime(None), ImageMediaType::Jpeg);
    /// ```
    pub fn from_mime(mime: Option<&str>) -> Self {
        let essence = mime
            .and_then(|m| m.split(';').next())
            .map(|m| m.trim().to_ascii_lowercase());
        match essence.as_deref() {
            Some("image/png") => Self::Png,
            Some("image/gif") => Self::Gif,
            Some("image/webp") => Self::Webp,
            _ => Self::Jpeg,
        }
    }

    pub fn as_mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

/// Base64-encoded image sent inline with the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub media_type: ImageMediaType,
    pub data: String,
}

/// One ordered piece of the user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Image(InlineImage),
    Text { text: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A single-turn generation request.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub parts: Vec<ContentPart>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
    pub stop_reason: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("upstream rejected credentials: {0}")]
    Unauthorized(String),

    #[error("upstream rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("upstream unreachable: {0}")]
    Transport(String),

    #[error("upstream API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("content blocked by upstream safety filters: {0}")]
    Blocked(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<HttpError> for LlmError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Api {
                status, message, ..
            } => match status.as_u16() {
                401 | 403 => LlmError::Unauthorized(message),
                429 => LlmError::RateLimited(message),
                code => LlmError::Api {
                    status: code,
                    message,
                },
            },
            HttpError::Network { message, .. } => LlmError::Transport(message),
            HttpError::Decode(msg, _) => LlmError::InvalidResponse(msg),
            HttpError::Url(msg) | HttpError::Build(msg) => LlmError::Config(msg),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one request and return the first text completion.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    fn provider(&self) -> Provider;
}
