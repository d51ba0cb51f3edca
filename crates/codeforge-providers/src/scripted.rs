//! Provider that replays pre-recorded text.
//!
//! Used to push a saved transcript through the engine without a network
//! call, and by tests that need exact control over chunk boundaries.

use async_trait::async_trait;
use futures::stream;

use codeforge_core::ProviderError;

use crate::traits::{ChunkStream, CompletionRequest, Provider, StreamChunk};

/// Replays a fixed chunk sequence, optionally failing part way through.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    chunks: Vec<String>,
    fail_after: Option<(usize, String)>,
}

impl ScriptedProvider {
    /// Replay the given chunks verbatim.
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            fail_after: None,
        }
    }

    /// Split a transcript into chunks of at most `chunk_size` bytes,
    /// respecting character boundaries.
    pub fn from_transcript(transcript: &str, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < transcript.len() {
            let mut end = (start + chunk_size).min(transcript.len());
            while !transcript.is_char_boundary(end) {
                end += 1;
            }
            chunks.push(transcript[start..end].to_string());
            start = end;
        }
        Self::new(chunks)
    }

    /// Yield a stream error after `count` chunks have been delivered.
    pub fn failing_after(mut self, count: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((count, message.into()));
        self
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "Scripted replay"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn complete_stream(&self, _request: CompletionRequest) -> anyhow::Result<ChunkStream> {
        let mut items: Vec<anyhow::Result<StreamChunk>> = Vec::new();

        match &self.fail_after {
            Some((count, message)) => {
                items.extend(self.chunks.iter().take(*count).cloned().map(StreamChunk::text).map(Ok));
                items.push(Err(ProviderError::stream_error("scripted", message.clone()).into()));
            }
            None => {
                items.extend(self.chunks.iter().cloned().map(StreamChunk::text).map(Ok));
                items.push(Ok(StreamChunk::done()));
            }
        }

        Ok(Box::pin(stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: String::new(),
            system: None,
            prompt: String::new(),
            max_tokens: 1,
            temperature: 0.0,
        }
    }

    #[test]
    fn test_transcript_split_respects_char_boundaries() {
        let provider = ScriptedProvider::from_transcript("héllo wörld", 2);
        assert_eq!(provider.chunks().concat(), "héllo wörld");
        assert!(provider.chunks().iter().all(|c| !c.is_empty()));
    }

    #[tokio::test]
    async fn test_replays_chunks_then_final() {
        let provider = ScriptedProvider::new(["a", "b"]);
        let chunks: Vec<StreamChunk> = provider
            .complete_stream(request())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].delta.as_deref(), Some("b"));
        assert!(chunks[2].is_final);
    }

    #[tokio::test]
    async fn test_failure_after_count() {
        let provider = ScriptedProvider::new(["a", "b", "c"]).failing_after(1, "connection reset");
        let items: Vec<anyhow::Result<StreamChunk>> =
            provider.complete_stream(request()).await.unwrap().collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        let err = items[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
