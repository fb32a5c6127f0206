//! Common types and utilities shared across Verdade crates.
//!
//! This crate is intentionally lightweight so that every crate in the
//! workspace can depend on it without pulling in the HTTP or model stacks.
//!
//! # Overview
//!
//! - [`Provider`]: which upstream model API answers verification requests
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use verdade_common::Provider;
//!
//! let provider: Provider = "gemini".parse().unwrap();
//! assert_eq!(provider, Provider::Gemini);
//! assert_eq!(provider.api_key_env(), "GEMINI_API_KEY");
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod observability;

/// Upstream generative model provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Anthropic,
    Gemini,
}

impl Provider {
    /// Model used when configuration does not name one.
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-sonnet-4-20250514",
            Provider::Gemini => "gemini-1.5-flash",
        }
    }

    /// Base URL of the provider's public API.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Provider::Anthropic => "https://api.anthropic.com/v1/",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/",
        }
    }

    /// Conventional environment variable holding the provider's API key.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Provider::Anthropic).unwrap();
        assert_eq!(json, "\"anthropic\"");
        let back: Provider = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(back, Provider::Gemini);
    }

    #[test]
    fn provider_parses_aliases() {
        assert_eq!("Claude".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!("ollama".parse::<Provider>().is_err());
    }
}
