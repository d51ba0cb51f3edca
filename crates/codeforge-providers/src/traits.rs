//! Provider trait definitions.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

/// Request for a streamed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model to use
    pub model: String,
    /// System prompt
    pub system: Option<String>,
    /// The single user turn
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0-1.0)
    pub temperature: f32,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens used
    pub input_tokens: u32,
    /// Output tokens generated
    pub output_tokens: u32,
}

/// Streaming chunk from a generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Text delta
    pub delta: Option<String>,
    /// Whether this is the final chunk
    pub is_final: bool,
    /// Usage, when the provider reports it
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// A chunk carrying only text.
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: Some(delta.into()),
            ..Default::default()
        }
    }

    /// The end-of-message chunk.
    pub fn done() -> Self {
        Self {
            is_final: true,
            ..Default::default()
        }
    }
}

/// Boxed stream of chunks as returned by [`Provider::complete_stream`].
pub type ChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<StreamChunk>> + Send>>;

/// A generative text service.
///
/// Implementations hold only connection settings; each call is independent,
/// so one provider can be shared by concurrent sessions.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider identifier.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Check if provider is configured and ready.
    fn is_configured(&self) -> bool;

    /// Start a streamed generation.
    async fn complete_stream(&self, request: CompletionRequest) -> anyhow::Result<ChunkStream>;
}
