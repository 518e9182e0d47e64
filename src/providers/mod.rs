//! Upstream generation transports.
//!
//! The invoker talks to the generation service only through
//! [`UpstreamTransport`], so tests can swap the network for a fake.

pub mod gemini;

pub use gemini::{GeminiAuth, GeminiTransport, GenerationConfig};

use async_trait::async_trait;

use crate::error::Result;

/// Raw outcome of one upstream HTTP exchange.
///
/// The status is left uninterpreted; classification belongs to the invoker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: String,
}

impl UpstreamReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends one rendered prompt to the generation service.
///
/// Returns `Err` only for transport failures (connect errors, timeouts,
/// unreadable bodies). Any HTTP status, including errors, is an `Ok` reply.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn generate(&self, model_id: &str, rendered_prompt: &str) -> Result<UpstreamReply>;
}
