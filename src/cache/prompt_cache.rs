//! Prompt response cache with TTL expiry and an optional capacity bound.
//!
//! Cache key is a SHA-256 digest of `model_id + ":" + rendered_prompt`.
//! An entry counts as present only while its age is strictly below the TTL;
//! expired entries linger physically until the next `put` purges them.
//! When a capacity is configured and reached, the oldest entries (by store
//! time) are evicted first.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use super::clock::{Clock, SystemClock};

/// Deterministic SHA-256 digest identifying a `(model, prompt)` pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Digest the UTF-8 bytes of `model_id + ":" + rendered_prompt`.
    ///
    /// Model ids never contain `:` (enforced by config validation), so the
    /// separator cannot be confused with prompt text.
    pub fn of(model_id: &str, rendered_prompt: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(model_id.as_bytes());
        hasher.update(b":");
        hasher.update(rendered_prompt.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

/// A single cached upstream response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// When the entry was written.
    pub stored_at: Instant,
    /// Upstream JSON body, returned verbatim on a hit.
    pub payload: Value,
}

/// Storage seam for upstream responses.
///
/// Implementations must be safe to share across request tasks.
pub trait PromptCache: Send + Sync {
    /// Return the payload for `fingerprint` if present and younger than the TTL.
    fn get(&self, fingerprint: &Fingerprint) -> Option<Value>;

    /// Store `payload`, unconditionally replacing any prior entry.
    fn put(&self, fingerprint: Fingerprint, payload: Value);

    /// Number of physically stored entries, expired ones included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local [`PromptCache`] guarded by a mutex.
pub struct MemoryPromptCache {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
    ttl: Duration,
    max_entries: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl MemoryPromptCache {
    /// Create a cache on the system clock.
    ///
    /// `max_entries` of `Some(0)` is clamped to 1.
    pub fn new(ttl: Duration, max_entries: Option<usize>) -> Self {
        Self::with_clock(ttl, max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, max_entries: Option<usize>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.map(|m| m.max(1)),
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.ttl
    }

    // -- private helpers ---------------------------------------------------

    fn evict_expired(&self, entries: &mut HashMap<Fingerprint, CacheEntry>, now: Instant) {
        let before = entries.len();
        entries.retain(|_, e| self.is_fresh(e, now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "Purged expired prompt cache entries");
        }
    }

    fn evict_oldest(entries: &mut HashMap<Fingerprint, CacheEntry>) {
        if let Some(oldest) = entries
            .iter()
            .min_by_key(|(_, e)| e.stored_at)
            .map(|(k, _)| *k)
        {
            debug!(key = %oldest.short(), "Evicting oldest prompt cache entry");
            entries.remove(&oldest);
        }
    }
}

impl PromptCache for MemoryPromptCache {
    fn get(&self, fingerprint: &Fingerprint) -> Option<Value> {
        let now = self.clock.now();
        let entries = self.entries.lock().expect("prompt cache lock poisoned");
        entries
            .get(fingerprint)
            .filter(|e| self.is_fresh(e, now))
            .map(|e| e.payload.clone())
    }

    fn put(&self, fingerprint: Fingerprint, payload: Value) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("prompt cache lock poisoned");
        self.evict_expired(&mut entries, now);
        if let Some(max) = self.max_entries {
            if !entries.contains_key(&fingerprint) {
                while entries.len() >= max {
                    Self::evict_oldest(&mut entries);
                }
            }
        }
        entries.insert(
            fingerprint,
            CacheEntry {
                stored_at: now,
                payload,
            },
        );
    }

    fn len(&self) -> usize {
        self.entries.lock().expect("prompt cache lock poisoned").len()
    }
}

impl fmt::Debug for MemoryPromptCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPromptCache")
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .field("len", &self.len())
            .finish()
    }
}
