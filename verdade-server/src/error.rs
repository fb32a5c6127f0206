//! API error type and its JSON response body

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use verdade_llm::traits::LlmError;
use verdade_verify::VerifyError;

/// Failures surfaced to HTTP callers. Messages are user-facing; upstream
/// details are logged, never returned.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Envie um texto, link ou imagem para verificar.")]
    MissingInput,

    #[error("Requisição inválida: {0}")]
    InvalidRequest(String),

    #[error("Arquivo muito grande. Envie uma imagem menor.")]
    PayloadTooLarge,

    #[error("API não configurada. Configure a chave de API para usar o verificador.")]
    MissingCredentials,

    #[error("Chave de API inválida ou sem permissão.")]
    UpstreamAuth,

    #[error("Limite de requisições atingido. Aguarde um momento e tente novamente.")]
    UpstreamRateLimited,

    #[error("Erro ao processar a verificação. Tente novamente.")]
    UpstreamFailure,

    #[error("Erro interno do servidor.")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingInput | ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::MissingCredentials => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UpstreamAuth => StatusCode::UNAUTHORIZED,
            ApiError::UpstreamRateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamFailure | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::MissingInput => "MISSING_INPUT",
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::MissingCredentials => "MISSING_CREDENTIALS",
            ApiError::UpstreamAuth => "UPSTREAM_AUTH",
            ApiError::UpstreamRateLimited => "UPSTREAM_RATE_LIMITED",
            ApiError::UpstreamFailure => "UPSTREAM_FAILURE",
            ApiError::Internal => "INTERNAL",
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ApiError::UpstreamRateLimited | ApiError::UpstreamFailure
        )
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::MissingInput => ApiError::MissingInput,
            VerifyError::MissingCredentials => ApiError::MissingCredentials,
            VerifyError::Upstream(llm) => llm.into(),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unauthorized(_) => ApiError::UpstreamAuth,
            LlmError::RateLimited(_) => ApiError::UpstreamRateLimited,
            LlmError::Api { status: 401 | 403, .. } => ApiError::UpstreamAuth,
            LlmError::Api { status: 429, .. } => ApiError::UpstreamRateLimited,
            LlmError::Config(_) => ApiError::Internal,
            LlmError::Transport(_)
            | LlmError::Api { .. }
            | LlmError::InvalidResponse(_)
            | LlmError::Blocked(_) => ApiError::UpstreamFailure,
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::InvalidRequest(err.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

/// API error response body
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Human-readable message, safe to show to end users
    pub error: String,

    /// Machine-readable error code
    pub code: String,

    /// Whether the client can retry
    pub recoverable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_code().to_string(),
            recoverable: self.is_recoverable(),
        };

        (status, Json(body)).into_response()
    }
}
