//! Gateway configuration.
//!
//! Resolution order: built-in defaults → optional TOML file → environment
//! variables. Everything is resolved once at startup and passed into
//! constructors; nothing reads the environment at call time.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{GateError, Result};

/// Gemini v1beta REST API base.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Persona name used when neither config nor request overrides it.
pub const DEFAULT_AI_NAME: &str = "TSURUKAME CORE";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub cache: CacheConfig,
    pub persona: PersonaConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0).
    pub bind: String,
    /// Listen port (default: 8000).
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Maximum accepted request body size in bytes.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
            body_limit_bytes: 64 * 1024,
        }
    }
}

/// Upstream Gemini settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key, sent as the `key` query parameter.
    pub api_key: Option<String>,
    /// OAuth access token, sent as `Authorization: Bearer`. Used only when no
    /// API key is set.
    pub access_token: Option<String>,
    /// Model identifier inserted into `models/{model}:generateContent`.
    pub model: String,
    /// REST API base URL.
    pub base_url: String,
    /// Per-request timeout in seconds. Must be non-zero.
    pub timeout_secs: u64,
    /// Optional `generationConfig.maxOutputTokens`.
    pub max_output_tokens: Option<u32>,
    /// Optional `generationConfig.temperature`.
    pub temperature: Option<f32>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            access_token: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout_secs: 30,
            max_output_tokens: None,
            temperature: None,
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("GeminiConfig")
            .field("api_key", &redact(&self.api_key))
            .field("access_token", &redact(&self.access_token))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GeminiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Prompt cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds (default: 60).
    pub ttl_secs: u64,
    /// Optional capacity bound; oldest entries are evicted first.
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            max_entries: Some(1024),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Template persona settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Default AI name inserted into templates and the root status line.
    pub ai_name: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            ai_name: DEFAULT_AI_NAME.to_string(),
        }
    }
}

impl Config {
    /// Load config from an optional TOML file, then apply process environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            GateError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Empty values are ignored. Unparsable numbers are ignored with a
    /// warning and the previous value kept.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            self.gemini.api_key = Some(key);
        }
        if let Some(token) = get("GEMINI_ACCESS_TOKEN") {
            self.gemini.access_token = Some(token);
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(base) = get("GEMINI_BASE_URL") {
            self.gemini.base_url = base;
        }
        if let Some(v) = parse_env(&get, "GEMINI_TIMEOUT_SECS") {
            self.gemini.timeout_secs = v;
        }
        if let Some(v) = parse_env(&get, "CACHE_TTL_SECS") {
            self.cache.ttl_secs = v;
        }
        if let Some(v) = parse_env(&get, "CACHE_MAX_ENTRIES") {
            self.cache.max_entries = Some(v);
        }
        if let Some(name) = get("AI_NAME") {
            self.persona.ai_name = name;
        }
        if let Some(host) = get("HOST") {
            self.server.bind = host;
        }
        if let Some(v) = parse_env(&get, "PORT") {
            self.server.port = v;
        }
    }

    /// Reject values that would make the gateway misbehave.
    ///
    /// A missing credential is allowed here; each invocation reports it.
    pub fn validate(&self) -> Result<()> {
        if self.gemini.timeout_secs == 0 {
            return Err(GateError::Config(
                "gemini.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(GateError::Config(
                "cache.ttl_secs must be greater than zero".into(),
            ));
        }
        validate_model_id(&self.gemini.model)?;
        url::Url::parse(&self.gemini.base_url).map_err(|e| {
            GateError::Config(format!(
                "gemini.base_url '{}' is not a valid URL: {}",
                self.gemini.base_url, e
            ))
        })?;
        Ok(())
    }
}

/// A model id is a single path segment without the `:` method separator.
pub fn validate_model_id(model: &str) -> Result<()> {
    if model.trim().is_empty() {
        return Err(GateError::Config("gemini.model must not be empty".into()));
    }
    if model.contains(':') || model.contains('/') {
        return Err(GateError::Config(format!(
            "gemini.model '{}' must not contain ':' or '/'",
            model
        )));
    }
    Ok(())
}

fn parse_env<T, G>(get: &G, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid number", key, raw);
            None
        }
    }
}
