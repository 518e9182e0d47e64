//! Upstream invoker: cache lookup, one outbound call, outcome classification.
//!
//! Per invocation: `Start → CacheHit → Done`, or
//! `Start → CacheMiss → Calling → {Success | RateLimited | UpstreamError |
//! TransportFailure} → Done`. A missing credential short-circuits to
//! `ConfigError` before the cache is consulted. Only `Success` is cached and
//! nothing is retried.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{Fingerprint, MemoryPromptCache, PromptCache};
use crate::config::Config;
use crate::error::Result;
use crate::health::UsageMetrics;
use crate::providers::{GeminiTransport, UpstreamReply, UpstreamTransport};

/// HTTP status the upstream uses for resource exhaustion.
const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// A fully rendered prompt bound to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    rendered_prompt: String,
    model_id: String,
}

impl PromptRequest {
    pub fn new(rendered_prompt: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            rendered_prompt: rendered_prompt.into(),
            model_id: model_id.into(),
        }
    }

    pub fn rendered_prompt(&self) -> &str {
        &self.rendered_prompt
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.model_id, &self.rendered_prompt)
    }
}

/// Classified outcome of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeResult {
    /// Upstream answered 2xx with a JSON body (or the cache did).
    Success(Value),
    /// Upstream answered 429. Carries the upstream body.
    RateLimited(Value),
    /// Upstream answered any other non-2xx status.
    UpstreamError { status: u16, body: Value },
    /// No credential configured; no network call was made.
    ConfigError(String),
    /// Network error, timeout, or an unparsable success body.
    TransportFailure(String),
}

impl InvokeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::RateLimited(_) => "rate_limited",
            Self::UpstreamError { .. } => "upstream_error",
            Self::ConfigError(_) => "config_error",
            Self::TransportFailure(_) => "transport_failure",
        }
    }
}

/// Map a raw upstream reply onto an [`InvokeResult`].
///
/// Error bodies are kept as JSON when they parse and as a JSON string
/// otherwise, so diagnostics are never lost.
pub fn classify(reply: UpstreamReply) -> InvokeResult {
    let UpstreamReply { status, body } = reply;
    if (200..300).contains(&status) {
        return match serde_json::from_str::<Value>(&body) {
            Ok(payload) => InvokeResult::Success(payload),
            Err(e) => InvokeResult::TransportFailure(format!(
                "Malformed upstream response (status {}): {}",
                status, e
            )),
        };
    }
    let body = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
    if status == STATUS_TOO_MANY_REQUESTS {
        InvokeResult::RateLimited(body)
    } else {
        InvokeResult::UpstreamError { status, body }
    }
}

/// Cache-fronted caller of the generation service.
pub struct UpstreamInvoker {
    transport: Option<Arc<dyn UpstreamTransport>>,
    cache: Arc<dyn PromptCache>,
    metrics: Arc<UsageMetrics>,
}

impl UpstreamInvoker {
    /// `transport` is `None` when no credential is configured; every
    /// invocation then returns [`InvokeResult::ConfigError`].
    pub fn new(transport: Option<Arc<dyn UpstreamTransport>>, cache: Arc<dyn PromptCache>) -> Self {
        Self {
            transport,
            cache,
            metrics: Arc::new(UsageMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<UsageMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Wire a Gemini transport and an in-memory cache from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = GeminiTransport::from_config(&config.gemini)?
            .map(|t| Arc::new(t) as Arc<dyn UpstreamTransport>);
        if transport.is_none() {
            warn!("No Gemini credential configured; prompt endpoints will report a config error");
        }
        let cache = Arc::new(MemoryPromptCache::new(
            config.cache.ttl(),
            config.cache.max_entries,
        ));
        Ok(Self::new(transport, cache))
    }

    pub fn metrics(&self) -> &Arc<UsageMetrics> {
        &self.metrics
    }

    pub fn cache(&self) -> &Arc<dyn PromptCache> {
        &self.cache
    }

    pub fn has_credentials(&self) -> bool {
        self.transport.is_some()
    }

    /// Run one invocation for `rendered_prompt` against `model_id`.
    pub async fn invoke(&self, rendered_prompt: &str, model_id: &str) -> InvokeResult {
        self.invoke_request(&PromptRequest::new(rendered_prompt, model_id))
            .await
    }

    pub async fn invoke_request(&self, request: &PromptRequest) -> InvokeResult {
        self.metrics.record_request();

        let Some(transport) = self.transport.as_ref() else {
            self.metrics.record_config_error();
            return InvokeResult::ConfigError(
                "No Gemini credential configured \
                 (set GEMINI_API_KEY, GOOGLE_API_KEY or GEMINI_ACCESS_TOKEN)"
                    .to_string(),
            );
        };

        let fingerprint = request.fingerprint();
        if let Some(payload) = self.cache.get(&fingerprint) {
            debug!(key = %fingerprint.short(), model = request.model_id(), "Prompt cache hit");
            self.metrics.record_cache_hit();
            return InvokeResult::Success(payload);
        }
        debug!(key = %fingerprint.short(), model = request.model_id(), "Prompt cache miss");
        self.metrics.record_cache_miss();

        let outcome = match transport
            .generate(request.model_id(), request.rendered_prompt())
            .await
        {
            Ok(reply) => classify(reply),
            Err(e) => InvokeResult::TransportFailure(e.to_string()),
        };

        match &outcome {
            InvokeResult::Success(payload) => {
                self.cache.put(fingerprint, payload.clone());
            }
            InvokeResult::RateLimited(_) => {
                warn!(model = request.model_id(), "Upstream rate limited the request");
                self.metrics.record_rate_limited();
            }
            InvokeResult::UpstreamError { status, .. } => {
                warn!(model = request.model_id(), status, "Upstream returned an error status");
                self.metrics.record_upstream_error();
            }
            InvokeResult::TransportFailure(reason) => {
                warn!(model = request.model_id(), "Upstream call failed: {}", reason);
                self.metrics.record_transport_failure();
            }
            InvokeResult::ConfigError(_) => {}
        }
        outcome
    }
}

impl std::fmt::Debug for UpstreamInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamInvoker")
            .field("has_credentials", &self.has_credentials())
            .field("cached_entries", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::GateError;
    use crate::providers::MockUpstreamTransport;
    use serde_json::json;
    use std::time::Duration;

    fn cache_with_clock() -> (Arc<MemoryPromptCache>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(MemoryPromptCache::with_clock(
            Duration::from_secs(60),
            None,
            clock.clone(),
        ));
        (cache, clock)
    }

    fn invoker(mock: MockUpstreamTransport, cache: Arc<MemoryPromptCache>) -> UpstreamInvoker {
        UpstreamInvoker::new(Some(Arc::new(mock)), cache)
    }

    // ── classify ────────────────────────────────────────────────────────────

    #[test]
    fn test_classify_200_is_success() {
        let r = classify(UpstreamReply::new(200, r#"{"ok":true}"#));
        assert_eq!(r, InvokeResult::Success(json!({"ok": true})));
    }

    #[test]
    fn test_classify_429_is_rate_limited() {
        let r = classify(UpstreamReply::new(429, r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#));
        assert_eq!(
            r,
            InvokeResult::RateLimited(json!({"error": {"status": "RESOURCE_EXHAUSTED"}}))
        );
    }

    #[test]
    fn test_classify_other_status_keeps_status_and_body() {
        let r = classify(UpstreamReply::new(400, r#"{"error":"bad"}"#));
        assert_eq!(
            r,
            InvokeResult::UpstreamError {
                status: 400,
                body: json!({"error": "bad"})
            }
        );
    }

    #[test]
    fn test_classify_non_json_error_body_kept_as_string() {
        let r = classify(UpstreamReply::new(503, "Service Unavailable"));
        assert_eq!(
            r,
            InvokeResult::UpstreamError {
                status: 503,
                body: json!("Service Unavailable")
            }
        );
    }

    #[test]
    fn test_classify_malformed_success_is_transport_failure() {
        let r = classify(UpstreamReply::new(200, "<html>"));
        assert!(matches!(r, InvokeResult::TransportFailure(_)));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(InvokeResult::Success(json!(null)).kind(), "success");
        assert_eq!(InvokeResult::RateLimited(json!(null)).kind(), "rate_limited");
        assert_eq!(InvokeResult::ConfigError("x".into()).kind(), "config_error");
        assert!(!InvokeResult::TransportFailure("x".into()).is_success());
    }

    #[test]
    fn test_prompt_request_fingerprint() {
        let req = PromptRequest::new("Hello", "model-a");
        assert_eq!(req.fingerprint(), Fingerprint::of("model-a", "Hello"));
        assert_eq!(req.rendered_prompt(), "Hello");
        assert_eq!(req.model_id(), "model-a");
    }

    // ── invoke ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cache_hit_skips_network_until_ttl() {
        let (cache, clock) = cache_with_clock();
        let mut mock = MockUpstreamTransport::new();
        mock.expect_generate()
            .withf(|model, prompt| model == "model-a" && prompt == "Hello")
            .times(2)
            .returning(|_, _| Ok(UpstreamReply::new(200, r#"{"ok":true}"#)));
        let inv = invoker(mock, cache);

        assert_eq!(
            inv.invoke("Hello", "model-a").await,
            InvokeResult::Success(json!({"ok": true}))
        );
        clock.advance(Duration::from_secs(30));
        assert_eq!(
            inv.invoke("Hello", "model-a").await,
            InvokeResult::Success(json!({"ok": true}))
        );
        clock.advance(Duration::from_secs(30));
        assert!(inv.invoke("Hello", "model-a").await.is_success());

        let s = inv.metrics().snapshot();
        assert_eq!(s.requests, 3);
        assert_eq!(s.cache_hits, 1);
        assert_eq!(s.cache_misses, 2);
    }

    #[tokio::test]
    async fn test_different_model_is_a_separate_slot() {
        let (cache, _) = cache_with_clock();
        let mut mock = MockUpstreamTransport::new();
        mock.expect_generate()
            .times(2)
            .returning(|model, _| Ok(UpstreamReply::new(200, format!(r#"{{"model":"{model}"}}"#))));
        let inv = invoker(mock, cache);

        assert_eq!(
            inv.invoke("Hello", "model-a").await,
            InvokeResult::Success(json!({"model": "model-a"}))
        );
        assert_eq!(
            inv.invoke("Hello", "model-b").await,
            InvokeResult::Success(json!({"model": "model-b"}))
        );
    }

    #[tokio::test]
    async fn test_rate_limited_is_not_cached() {
        let (cache, _) = cache_with_clock();
        let mut mock = MockUpstreamTransport::new();
        mock.expect_generate()
            .times(2)
            .returning(|_, _| Ok(UpstreamReply::new(429, r#"{"error":"quota"}"#)));
        let inv = invoker(mock, cache.clone());

        assert!(matches!(
            inv.invoke("p", "m").await,
            InvokeResult::RateLimited(_)
        ));
        assert!(matches!(
            inv.invoke("p", "m").await,
            InvokeResult::RateLimited(_)
        ));
        assert!(cache.is_empty());
        assert_eq!(inv.metrics().snapshot().rate_limited, 2);
    }

    #[tokio::test]
    async fn test_upstream_error_is_not_cached() {
        let (cache, _) = cache_with_clock();
        let mut mock = MockUpstreamTransport::new();
        mock.expect_generate()
            .times(2)
            .returning(|_, _| Ok(UpstreamReply::new(500, "boom")));
        let inv = invoker(mock, cache.clone());

        for _ in 0..2 {
            assert_eq!(
                inv.invoke("p", "m").await,
                InvokeResult::UpstreamError {
                    status: 500,
                    body: json!("boom")
                }
            );
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_cached() {
        let (cache, _) = cache_with_clock();
        let mut mock = MockUpstreamTransport::new();
        mock.expect_generate()
            .times(2)
            .returning(|_, _| Err(GateError::Provider("Gemini request timed out".into())));
        let inv = invoker(mock, cache.clone());

        for _ in 0..2 {
            match inv.invoke("p", "m").await {
                InvokeResult::TransportFailure(reason) => assert!(reason.contains("timed out")),
                other => panic!("expected transport failure, got {other:?}"),
            }
        }
        assert!(cache.is_empty());
        assert_eq!(inv.metrics().snapshot().transport_failures, 2);
    }

    #[tokio::test]
    async fn test_failure_then_success_populates_cache() {
        let (cache, _) = cache_with_clock();
        let mut mock = MockUpstreamTransport::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(UpstreamReply::new(429, "{}")));
        mock.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(UpstreamReply::new(200, r#"{"n":1}"#)));
        let inv = invoker(mock, cache);

        assert!(matches!(inv.invoke("p", "m").await, InvokeResult::RateLimited(_)));
        assert!(inv.invoke("p", "m").await.is_success());
        // Third call is served from cache; the mock would panic on a third call.
        assert_eq!(inv.invoke("p", "m").await, InvokeResult::Success(json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_fast() {
        let (cache, _) = cache_with_clock();
        cache.put(Fingerprint::of("m", "p"), json!({"cached": true}));
        let inv = UpstreamInvoker::new(None, cache);

        match inv.invoke("p", "m").await {
            InvokeResult::ConfigError(reason) => {
                assert!(reason.contains("GEMINI_API_KEY"));
                assert!(reason.contains("GOOGLE_API_KEY"));
                assert!(reason.contains("GEMINI_ACCESS_TOKEN"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
        assert!(!inv.has_credentials());
        assert_eq!(inv.metrics().snapshot().config_errors, 1);
    }

    #[test]
    fn test_from_config_without_key_has_no_credentials() {
        let inv = UpstreamInvoker::from_config(&Config::default()).unwrap();
        assert!(!inv.has_credentials());
        assert!(inv.cache().is_empty());
    }
}
