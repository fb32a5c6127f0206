//! Loader for service configuration with YAML + environment overlays.
//!
//! Sources, lowest precedence first: built-in defaults, YAML files/snippets
//! in the order they were added, then `VERDADE__`-prefixed environment
//! variables (`VERDADE__LLM__MODEL=...`). String values may reference
//! `${VAR}`; references are expanded recursively after merging.
//!
//! ```yaml
//! server:
//!   bind: "0.0.0.0:3000"
//!   max_upload_bytes: 10485760
//!   missing_credentials: unavailable   # or: demo
//! llm:
//!   provider: anthropic                # or: gemini
//!   model: claude-sonnet-4-20250514
//!   api_key: "${ANTHROPIC_API_KEY}"
//!   max_tokens: 1024
//!   timeout_secs: 60
//!   max_retries: 1
//! prompt:
//!   system_file: ./prompts/verificador.md
//! logging:
//!   format: json
//!   filter: "info,verdade_http=debug"
//! ```
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use verdade_common::observability::LogFormat;
use verdade_common::Provider;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "VERDADE";
const CONFIG_FILE_NAME: &str = "verdade.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VerdadeConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub prompt: PromptConfig,
    pub logging: LoggingConfig,
}

/// What to answer when no upstream API key is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingCredentialsPolicy {
    /// Respond 503.
    #[default]
    Unavailable,
    /// Respond 200 with a flagged demonstration record.
    Demo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_upload_bytes: usize,
    pub missing_credentials: MissingCredentialsPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".into(),
            max_upload_bytes: 10 * 1024 * 1024,
            missing_credentials: MissingCredentialsPolicy::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model: None,
            api_key: None,
            endpoint: None,
            max_tokens: 1024,
            temperature: None,
            timeout_secs: 60,
            max_retries: 1,
        }
    }
}

impl LlmConfig {
    pub fn model(&self) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.provider.default_model())
            .to_string()
    }

    /// The configured key, else the provider's conventional env var.
    ///
    /// Blank values and unresolved `${...}` placeholders count as absent.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .and_then(usable_key)
            .or_else(|| {
                std::env::var(self.provider.api_key_env())
                    .ok()
                    .as_deref()
                    .and_then(usable_key)
            })
    }
}

fn usable_key(raw: &str) -> Option<String> {
    let key = raw.trim();
    if key.is_empty() || key.contains("${") {
        None
    } else {
        Some(key.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Inline system instruction; wins over `system_file`.
    pub system: Option<String>,
    pub system_file: Option<PathBuf>,
}

impl PromptConfig {
    /// Resolve the configured system instruction, if any.
    pub fn system_prompt(&self) -> Result<Option<String>, ConfigError> {
        if let Some(inline) = self.system.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok(Some(inline.to_string()));
        }
        match &self.system_file {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    ConfigError::Message(format!(
                        "failed to read system prompt {}: {e}",
                        path.display()
                    ))
                })?;
                if text.trim().is_empty() {
                    return Err(ConfigError::Message(format!(
                        "system prompt file {} is empty",
                        path.display()
                    )));
                }
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter: String,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".into(),
            dir: None,
            stderr: true,
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => break,
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Default config file location: `./verdade.yaml` if present, else
/// `<config dir>/verdade/verdade.yaml` if present.
pub fn discover_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("verdade").join(CONFIG_FILE_NAME))
        .filter(|p| p.is_file())
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct VerdadeConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for VerdadeConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl VerdadeConfigLoader {
    /// Start from built-in defaults.
    ///
    /// ```
    /// use verdade_config::VerdadeConfigLoader;
    ///
    /// let config = VerdadeConfigLoader::new().load().expect("defaults load");
    /// assert_eq!(config.server.bind, "127.0.0.1:3000");
    /// assert_eq!(config.llm.max_tokens, 1024);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be missing (env-only deployments).
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use verdade_common::Provider;
    /// use verdade_config::{MissingCredentialsPolicy, VerdadeConfigLoader};
    ///
    /// let cfg = VerdadeConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// server:
    ///   missing_credentials: demo
    /// llm:
    ///   provider: gemini
    ///   model: gemini-2.0-flash
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.server.missing_credentials, MissingCredentialsPolicy::Demo);
    /// assert_eq!(cfg.llm.provider, Provider::Gemini);
    /// assert_eq!(cfg.llm.model(), "gemini-2.0-flash");
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge sources, apply `VERDADE__` env overrides, expand `${VAR}`
    /// placeholders and deserialize.
    ///
    /// ```
    /// use verdade_config::VerdadeConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOCTEST_VERDADE_KEY", "sk-from-env"); }
    ///
    /// let config = VerdadeConfigLoader::new()
    ///     .with_yaml_str("llm:\n  api_key: \"${DOCTEST_VERDADE_KEY}\"\n")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.llm.resolved_api_key().as_deref(), Some("sk-from-env"));
    ///
    /// unsafe { std::env::remove_var("DOCTEST_VERDADE_KEY"); }
    /// ```
    pub fn load(self) -> Result<VerdadeConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("REGION", Some("sa-east-1")), ("TIER", Some("prod"))], || {
            let mut v = json!(["hello-$REGION", { "loc": "${REGION}-${TIER}" }, 42, true, null]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["hello-sa-east-1", { "loc": "sa-east-1-prod" }, 42, true, null])
            );
        });
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                let mut v = json!("X=${FOO}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("X=start-mid-qux-end"));
            },
        );
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        temp_env::with_var_unset("DOES_NOT_EXIST", || {
            let mut v = json!("hi-${DOES_NOT_EXIST}");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("hi-${DOES_NOT_EXIST}"));
        });
    }

    #[test]
    fn placeholder_and_blank_keys_are_absent() {
        temp_env::with_var_unset("ANTHROPIC_API_KEY", || {
            let mut llm = LlmConfig {
                api_key: Some("${ANTHROPIC_API_KEY}".into()),
                ..Default::default()
            };
            assert_eq!(llm.resolved_api_key(), None);
            llm.api_key = Some("   ".into());
            assert_eq!(llm.resolved_api_key(), None);
            llm.api_key = Some(" sk-live ".into());
            assert_eq!(llm.resolved_api_key().as_deref(), Some("sk-live"));
        });
    }

    #[test]
    fn provider_env_var_is_the_fallback_key() {
        temp_env::with_var("GEMINI_API_KEY", Some("AIza-env"), || {
            let llm = LlmConfig {
                provider: Provider::Gemini,
                ..Default::default()
            };
            assert_eq!(llm.resolved_api_key().as_deref(), Some("AIza-env"));
        });
    }

    #[test]
    fn model_defaults_per_provider() {
        let llm = LlmConfig {
            provider: Provider::Gemini,
            model: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(llm.model(), Provider::Gemini.default_model());
    }

    #[test]
    fn inline_prompt_wins_over_file() {
        let prompt = PromptConfig {
            system: Some("inline".into()),
            system_file: Some(PathBuf::from("/nonexistent/prompt.md")),
        };
        assert_eq!(prompt.system_prompt().unwrap().as_deref(), Some("inline"));
    }

    #[test]
    fn missing_prompt_file_is_an_error() {
        let prompt = PromptConfig {
            system: None,
            system_file: Some(PathBuf::from("/nonexistent/prompt.md")),
        };
        assert!(prompt.system_prompt().is_err());
    }
}
