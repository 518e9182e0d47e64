//! Gemini `generateContent` transport.
//!
//! Auth priority: API key (`?key=` query parameter) → OAuth access token
//! (`Authorization: Bearer`). Responses are returned raw; the body is never
//! interpreted here.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::GeminiConfig;
use crate::error::{GateError, Result};

use super::{UpstreamReply, UpstreamTransport};

// ── Auth ─────────────────────────────────────────────────────────────────────

/// Authentication method for the Gemini REST API.
#[derive(Clone)]
pub enum GeminiAuth {
    /// Standard API key — sent as `?key=` query parameter.
    ApiKey(String),
    /// OAuth bearer token — sent as `Authorization: Bearer` header.
    BearerToken(String),
}

impl std::fmt::Debug for GeminiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("GeminiAuth::ApiKey([REDACTED])"),
            Self::BearerToken(_) => f.write_str("GeminiAuth::BearerToken([REDACTED])"),
        }
    }
}

impl GeminiAuth {
    /// Pick credentials in priority order. Empty strings count as absent.
    pub fn resolve(api_key: Option<&str>, access_token: Option<&str>) -> Option<Self> {
        if let Some(k) = api_key.filter(|k| !k.trim().is_empty()) {
            return Some(Self::ApiKey(k.to_string()));
        }
        if let Some(t) = access_token.filter(|t| !t.trim().is_empty()) {
            return Some(Self::BearerToken(t.to_string()));
        }
        None
    }
}

// ── Generation config ────────────────────────────────────────────────────────

/// Optional sampling knobs sent as `generationConfig`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationConfig {
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerationConfig {
    fn to_json(self) -> Option<Value> {
        if self.max_output_tokens.is_none() && self.temperature.is_none() {
            return None;
        }
        let mut cfg = json!({});
        if let Some(max_tokens) = self.max_output_tokens {
            cfg["maxOutputTokens"] = json!(max_tokens);
        }
        if let Some(temp) = self.temperature {
            cfg["temperature"] = json!(temp);
        }
        Some(cfg)
    }
}

// ── Transport ────────────────────────────────────────────────────────────────

/// `reqwest`-backed transport for the Gemini REST API.
pub struct GeminiTransport {
    auth: GeminiAuth,
    base_url: String,
    generation: GenerationConfig,
    client: Client,
}

impl std::fmt::Debug for GeminiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiTransport")
            .field("auth", &self.auth)
            .field("base_url", &self.base_url)
            .field("generation", &self.generation)
            .finish()
    }
}

impl GeminiTransport {
    /// Build a transport whose every request is bounded by `timeout`.
    pub fn new(auth: GeminiAuth, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
            generation: GenerationConfig::default(),
            client,
        })
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Build from config. Returns `Ok(None)` when no credential is configured.
    pub fn from_config(config: &GeminiConfig) -> Result<Option<Self>> {
        let Some(auth) =
            GeminiAuth::resolve(config.api_key.as_deref(), config.access_token.as_deref())
        else {
            return Ok(None);
        };
        let transport = Self::new(auth, &config.base_url, config.timeout())?.with_generation_config(
            GenerationConfig {
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
            },
        );
        Ok(Some(transport))
    }

    /// Build the `generateContent` request body for a single prompt.
    pub fn build_request_body(&self, rendered_prompt: &str) -> Value {
        let mut body = json!({
            "contents": [{
                "parts": [{ "text": rendered_prompt }]
            }]
        });
        if let Some(cfg) = self.generation.to_json() {
            body["generationConfig"] = cfg;
        }
        body
    }

    /// Build the full API URL for `generateContent`.
    fn api_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    /// Attach authentication to the request builder.
    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            GeminiAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
            GeminiAuth::BearerToken(token) => {
                request.header("Authorization", format!("Bearer {}", token))
            }
        }
    }
}

#[async_trait]
impl UpstreamTransport for GeminiTransport {
    async fn generate(&self, model_id: &str, rendered_prompt: &str) -> Result<UpstreamReply> {
        let body = self.build_request_body(rendered_prompt);

        debug!("Gemini request to model {}", model_id);

        let request = self
            .client
            .post(self.api_url(model_id))
            .header("Content-Type", "application/json")
            .json(&body);

        // The request URL can carry the API key; strip it from error text.
        let response = self.apply_auth(request).send().await.map_err(|e| {
            let e = e.without_url();
            if e.is_timeout() {
                GateError::Provider(format!("Gemini request timed out: {}", e))
            } else {
                GateError::Provider(format!("Gemini request failed: {}", e))
            }
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| {
                GateError::Provider(format!("Failed to read Gemini response: {}", e.without_url()))
            })?;

        Ok(UpstreamReply::new(status, text))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
