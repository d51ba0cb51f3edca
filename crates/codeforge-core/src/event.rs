//! Progress notifications published during an extraction session.
//!
//! Each event serialises to a single JSON object with a `type`
//! discriminator, which is what the relaying HTTP layer forwards to clients.

use serde::{Deserialize, Serialize};

use crate::finding::ValidationFinding;
use crate::session::{FailureCategory, SessionFailure};

/// One notification in a session's ordered event sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    /// Informational status line
    #[serde(rename = "status")]
    Status { message: String },

    /// A file-start marker opened a new artifact
    #[serde(rename = "file")]
    ArtifactStarted { filename: String },

    /// Cumulative bytes received from the producer
    #[serde(rename = "progress")]
    Progress {
        length: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        percentage: Option<u8>,
    },

    /// The validator rejected the artifact set
    #[serde(rename = "validation")]
    ValidationFailed(ValidationFinding),

    /// Terminal: artifacts were committed
    #[serde(rename = "complete")]
    Completed {
        #[serde(rename = "projectId")]
        project_id: String,
        #[serde(rename = "fileCount")]
        file_count: usize,
        duration: String,
    },

    /// Terminal: the session failed
    #[serde(rename = "error")]
    Error {
        error: String,
        category: FailureCategory,
    },
}

impl ProgressEvent {
    /// Build the terminal error event for a failure.
    pub fn from_failure(failure: &SessionFailure) -> Self {
        ProgressEvent::Error {
            error: failure.to_string(),
            category: failure.category(),
        }
    }

    /// Whether no further events may follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Completed { .. } | ProgressEvent::Error { .. })
    }

    /// The `type` discriminator as serialised.
    pub fn type_name(&self) -> &'static str {
        match self {
            ProgressEvent::Status { .. } => "status",
            ProgressEvent::ArtifactStarted { .. } => "file",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::ValidationFailed(_) => "validation",
            ProgressEvent::Completed { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }

    /// Serialise as a server-sent-events frame: `data: <json>\n\n`.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
