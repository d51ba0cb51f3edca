//! Anthropic (Claude) provider implementation.

use std::collections::VecDeque;
use std::fmt;

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use codeforge_core::config::ProviderConfig;
use codeforge_core::ProviderError;

use crate::sse::SseParser;
use crate::traits::{ChunkStream, CompletionRequest, Provider, StreamChunk, Usage};

/// Anthropic API base URL.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";

/// Current Anthropic API version.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const PROVIDER_ID: &str = "anthropic";

/// Anthropic provider for Claude models.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            default_model: "claude-sonnet-4-20250514".to_string(),
        }
    }

    /// Create from environment variable.
    pub fn from_env() -> Option<Self> {
        std::env::var("ANTHROPIC_API_KEY").ok().map(Self::new)
    }

    /// Create from configuration, falling back to `ANTHROPIC_API_KEY`.
    pub fn from_config(config: Option<&ProviderConfig>) -> Option<Self> {
        let provider = match config.and_then(ProviderConfig::resolve_api_key) {
            Some(key) => Self::new(key),
            None => Self::from_env()?,
        };
        match config.and_then(|c| c.base_url.clone()) {
            Some(base_url) => Some(provider.with_base_url(base_url)),
            None => Some(provider),
        }
    }

    /// Set the default model.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Point at a custom endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(&self, request: CompletionRequest) -> AnthropicRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model
        };

        AnthropicRequest {
            model,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.prompt,
            }],
            system: request.system,
            max_tokens: request.max_tokens,
            temperature: Some(request.temperature),
            stream: true,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Anthropic"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete_stream(&self, request: CompletionRequest) -> anyhow::Result<ChunkStream> {
        let api_request = self.build_request(request);

        debug!("Sending streaming request to Anthropic API");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic API error: {} - {}", status, error_text);
            return Err(ProviderError::api_error(PROVIDER_ID, status.as_u16(), error_text).into());
        }

        Ok(decode_event_stream(response.bytes_stream()))
    }
}

/// Turn a raw Messages API response body into text chunks.
///
/// Network reads may split events, lines and multi-byte characters anywhere;
/// one read can also carry several events, so parsed chunks are queued.
pub fn decode_event_stream<S, B, E>(byte_stream: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let parsed_stream = stream::unfold(
        (byte_stream, SseParser::new(), VecDeque::new()),
        |(mut byte_stream, mut parser, mut queued)| async move {
            loop {
                if let Some(item) = queued.pop_front() {
                    return Some((item, (byte_stream, parser, queued)));
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        for event in parser.feed(bytes.as_ref()) {
                            if event.is_done() {
                                queued.push_back(Ok(StreamChunk::done()));
                                continue;
                            }
                            match parse_anthropic_event(&event.data) {
                                Ok(Some(chunk)) => queued.push_back(Ok(chunk)),
                                Ok(None) => {}
                                Err(EventError::Provider(e)) => queued.push_back(Err(e.into())),
                                Err(EventError::Malformed(e)) => {
                                    warn!("Failed to parse SSE event: {}", e);
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let err = ProviderError::stream_error(PROVIDER_ID, e.to_string());
                        return Some((Err(err.into()), (byte_stream, parser, queued)));
                    }
                    None => return None,
                }
            }
        },
    );

    Box::pin(parsed_stream)
}

/// Failure to turn one SSE payload into a chunk.
#[derive(Debug)]
enum EventError {
    /// Payload was not a known event; skipped
    Malformed(serde_json::Error),
    /// The API reported an error mid-stream; fatal
    Provider(ProviderError),
}

/// Parse an Anthropic stream event from JSON data.
fn parse_anthropic_event(data: &str) -> Result<Option<StreamChunk>, EventError> {
    let event: StreamEvent = serde_json::from_str(data).map_err(EventError::Malformed)?;

    match event {
        StreamEvent::ContentBlockDelta { delta } => Ok(delta.text.map(StreamChunk::text)),
        StreamEvent::ContentBlockStart { content_block } => {
            Ok(content_block.text.filter(|t| !t.is_empty()).map(StreamChunk::text))
        }
        StreamEvent::MessageStart { message } => {
            let input_tokens = message
                .as_ref()
                .and_then(|m| m.get("usage"))
                .and_then(|u| u.get("input_tokens"))
                .and_then(|v| v.as_u64());
            Ok(input_tokens.map(|tokens| StreamChunk {
                usage: Some(Usage {
                    input_tokens: tokens as u32,
                    output_tokens: 0,
                }),
                ..Default::default()
            }))
        }
        StreamEvent::MessageDelta { usage } => Ok(usage.map(|u| StreamChunk {
            usage: Some(Usage {
                input_tokens: 0,
                output_tokens: u.output_tokens,
            }),
            ..Default::default()
        })),
        StreamEvent::MessageStop => Ok(Some(StreamChunk::done())),
        StreamEvent::ContentBlockStop | StreamEvent::Ping => Ok(None),
        StreamEvent::Error { error } => {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            Err(EventError::Provider(ProviderError::stream_error(PROVIDER_ID, message)))
        }
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

// Streaming event types

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: Option<serde_json::Value> },
    #[serde(rename = "content_block_start")]
    ContentBlockStart { content_block: ContentBlock },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: ContentDelta },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop,
    #[serde(rename = "message_delta")]
    MessageDelta { usage: Option<DeltaUsage> },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "error")]
    Error { error: serde_json::Value },
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDelta {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeltaUsage {
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_metadata() {
        let provider = AnthropicProvider::new("test-key");
        assert_eq!(provider.id(), "anthropic");
        assert_eq!(provider.name(), "Anthropic");
        assert!(provider.is_configured());
        assert!(!AnthropicProvider::new("").is_configured());
    }

    #[test]
    fn test_build_request_uses_default_model() {
        let provider = AnthropicProvider::new("k").with_default_model("claude-test");
        let request = provider.build_request(CompletionRequest {
            model: String::new(),
            system: None,
            prompt: "build me an app".to_string(),
            max_tokens: 8000,
            temperature: 0.7,
        });

        assert_eq!(request.model, "claude-test");
        assert!(request.stream);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"], "build me an app");
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_parse_text_delta() {
        let chunk = parse_anthropic_event(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"=== FILE"}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(chunk.delta.as_deref(), Some("=== FILE"));
        assert!(!chunk.is_final);
    }

    fn delta_event(text: &str) -> String {
        let data = serde_json::json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": text},
        });
        format!("event: content_block_delta\ndata: {}\n\n", data)
    }

    #[tokio::test]
    async fn test_decode_event_stream_rejoins_split_characters() {
        let body = format!("{}{}", delta_event("<p>café</p>\n"), "data: {\"type\":\"message_stop\"}\n\n");
        let bytes = body.into_bytes();
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let reads: Vec<Result<Vec<u8>, std::io::Error>> =
            vec![Ok(bytes[..split].to_vec()), Ok(bytes[split..].to_vec())];

        let chunks: Vec<StreamChunk> = decode_event_stream(stream::iter(reads))
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks[0].delta.as_deref(), Some("<p>café</p>\n"));
        assert!(chunks.last().unwrap().is_final);
    }

    #[tokio::test]
    async fn test_decode_event_stream_reports_read_errors() {
        let reads: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(delta_event("one").into_bytes()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];

        let items: Vec<_> = decode_event_stream(stream::iter(reads)).collect().await;

        assert_eq!(items[0].as_ref().unwrap().delta.as_deref(), Some("one"));
        assert!(items[1].as_ref().unwrap_err().to_string().contains("reset"));
    }

    #[test]
    fn test_parse_message_stop_and_ping() {
        let stop = parse_anthropic_event(r#"{"type":"message_stop"}"#).unwrap().unwrap();
        assert!(stop.is_final);
        assert!(parse_anthropic_event(r#"{"type":"ping"}"#).unwrap().is_none());
        assert!(parse_anthropic_event(r#"{"type":"content_block_stop","index":0}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_parse_error_event_is_fatal() {
        let result = parse_anthropic_event(
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        );
        match result {
            Err(EventError::Provider(e)) => assert!(e.to_string().contains("Overloaded")),
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_is_malformed() {
        assert!(matches!(
            parse_anthropic_event(r#"{"type":"mystery"}"#),
            Err(EventError::Malformed(_))
        ));
    }

    #[test]
    fn test_from_config_prefers_explicit_key() {
        let config = ProviderConfig {
            api_key: Some("from-config".to_string()),
            api_key_env: None,
            base_url: Some("http://localhost:8080/v1/".to_string()),
        };
        let provider = AnthropicProvider::from_config(Some(&config)).unwrap();
        assert_eq!(provider.api_key, "from-config");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }
}
