//! Usage counters and periodic usage logging.
//!
//! - [`UsageMetrics`] for lock-free per-request counters
//! - [`start_periodic_usage_flush`] for periodic metric emission

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

const USAGE_FLUSH_INTERVAL_SECS: u64 = 60;

/// Lock-free usage counters shared by the invoker and the HTTP layer.
#[derive(Debug, Default)]
pub struct UsageMetrics {
    /// Total prompt invocations.
    pub requests: AtomicU64,
    /// Invocations answered from the prompt cache.
    pub cache_hits: AtomicU64,
    /// Invocations that went upstream.
    pub cache_misses: AtomicU64,
    /// Upstream 429 responses.
    pub rate_limited: AtomicU64,
    /// Upstream non-2xx responses other than 429.
    pub upstream_errors: AtomicU64,
    /// Network errors, timeouts and malformed upstream bodies.
    pub transport_failures: AtomicU64,
    /// Invocations refused for missing credentials.
    pub config_errors: AtomicU64,
}

/// Point-in-time copy of [`UsageMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rate_limited: u64,
    pub upstream_errors: u64,
    pub transport_failures: u64,
    pub config_errors: u64,
}

impl UsageMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_config_error(&self) {
        self.config_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            config_errors: self.config_errors.load(Ordering::Relaxed),
        }
    }

    /// Emit current counters as a structured log line.
    pub fn emit_usage(&self, reason: &str) {
        let s = self.snapshot();
        info!(
            event = "usage_summary",
            reason = reason,
            requests = s.requests,
            cache_hits = s.cache_hits,
            cache_misses = s.cache_misses,
            rate_limited = s.rate_limited,
            upstream_errors = s.upstream_errors,
            transport_failures = s.transport_failures,
            config_errors = s.config_errors,
            "Usage metrics"
        );
    }
}

/// Spawn a task that logs usage every minute and once more on shutdown.
pub fn start_periodic_usage_flush(
    metrics: Arc<UsageMetrics>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(USAGE_FLUSH_INTERVAL_SECS));
        interval.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    metrics.emit_usage("periodic");
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        metrics.emit_usage("shutdown");
                        break;
                    }
                }
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
