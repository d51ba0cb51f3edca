//! # codeforge-providers
//!
//! Generative text service abstraction for Codeforge.
//!
//! This crate provides:
//! - [`Provider`] trait: a stateless capability handed to each session
//! - Anthropic streaming implementation
//! - Scripted provider for transcript replay
//! - SSE parsing on top of the shared line reassembler

pub mod anthropic;
pub mod scripted;
pub mod sse;
pub mod traits;

pub use anthropic::AnthropicProvider;
pub use scripted::ScriptedProvider;
pub use traits::{ChunkStream, CompletionRequest, Provider, StreamChunk, Usage};
