//! # codeforge-core
//!
//! Core types and abstractions for Codeforge, the streaming multi-file
//! extraction engine.
//!
//! This crate provides:
//! - Artifact drafts, artifact sets and extension-based classification
//! - Validation findings
//! - Line reassembly across chunk boundaries
//! - Progress events and their wire format
//! - Session and project status, terminal failure taxonomy
//! - Configuration system
//! - Common error types

pub mod artifact;
pub mod config;
pub mod error;
pub mod event;
pub mod finding;
pub mod reassembler;
pub mod session;

pub use artifact::{ArtifactDraft, ArtifactKind, ArtifactSet, ScriptGrammar};
pub use config::Config;
pub use error::{Error, ProviderError, Result};
pub use event::ProgressEvent;
pub use finding::{FindingKind, ValidationFinding};
pub use reassembler::LineReassembler;
pub use session::{FailureCategory, ProjectStatus, SessionFailure, SessionStatus};
