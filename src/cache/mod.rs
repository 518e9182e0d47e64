//! In-memory prompt response cache with TTL expiry.

pub mod clock;
pub mod prompt_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use prompt_cache::{CacheEntry, Fingerprint, MemoryPromptCache, PromptCache};
