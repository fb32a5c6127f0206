//! Shared application state

use std::sync::Arc;

use verdade_common::Provider;
use verdade_config::MissingCredentialsPolicy;
use verdade_verify::Verifier;

/// State handed to every handler.
pub struct AppState {
    /// `None` when no API key is configured.
    pub verifier: Option<Arc<Verifier>>,
    pub provider: Provider,
    pub model: String,
    pub missing_credentials: MissingCredentialsPolicy,
    /// Request body cap for uploads.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn has_credentials(&self) -> bool {
        self.verifier.is_some()
    }
}
