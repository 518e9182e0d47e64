//! PromptGate: a caching HTTP façade over the Gemini `generateContent` API.
//!
//! Requests are rendered through fixed templates ([`prompts`]), looked up in
//! a TTL cache ([`cache`]) and, on a miss, forwarded once to the upstream
//! ([`providers`]) by the [`invoker`], which classifies the outcome.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod invoker;
pub mod prompts;
pub mod providers;

pub use cache::{Fingerprint, MemoryPromptCache, PromptCache};
pub use config::Config;
pub use error::{GateError, Result};
pub use invoker::{InvokeResult, PromptRequest, UpstreamInvoker};
pub use providers::{GeminiTransport, UpstreamReply, UpstreamTransport};
