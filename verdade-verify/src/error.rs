use thiserror::Error;
use verdade_llm::traits::LlmError;

/// Failures a verification can end in. Malformed model output is not one of
/// them: it always degrades to an unverified record.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Neither text nor image was supplied.
    #[error("Envie um texto, link ou imagem para verificar.")]
    MissingInput,

    /// No upstream API key is configured.
    #[error("API não configurada: nenhuma chave de API disponível")]
    MissingCredentials,

    /// The upstream model call failed.
    #[error("upstream model call failed: {0}")]
    Upstream(#[from] LlmError),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
