//! Session lifecycle and terminal failure types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::finding::ValidationFinding;

/// Status of one extraction session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Chunks are still being consumed or the result is not yet committed
    Running,
    /// Artifacts were validated and committed
    Completed,
    /// Terminal failure; nothing was committed
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }
}

/// Status recorded on the owning project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Project exists, nothing generated yet
    Created,
    /// A generation was committed
    Generated,
    /// The latest generation failed
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Created => "created",
            ProjectStatus::Generated => "generated",
            ProjectStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(ProjectStatus::Created),
            "generated" => Some(ProjectStatus::Generated),
            "failed" => Some(ProjectStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a terminal failure, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    UpstreamStreamError,
    ValidationError,
    InfrastructureError,
}

/// Why a session ended in [`SessionStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    /// The producer connection failed or reported an error mid-stream
    Upstream { message: String },
    /// The extracted set did not pass validation
    Validation(ValidationFinding),
    /// The durable write failed after validation passed
    Infrastructure { message: String },
}

impl SessionFailure {
    pub fn upstream(message: impl Into<String>) -> Self {
        SessionFailure::Upstream {
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        SessionFailure::Infrastructure {
            message: message.into(),
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            SessionFailure::Upstream { .. } => FailureCategory::UpstreamStreamError,
            SessionFailure::Validation(_) => FailureCategory::ValidationError,
            SessionFailure::Infrastructure { .. } => FailureCategory::InfrastructureError,
        }
    }

    pub fn finding(&self) -> Option<&ValidationFinding> {
        match self {
            SessionFailure::Validation(finding) => Some(finding),
            _ => None,
        }
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFailure::Upstream { message } => write!(f, "Generation stream failed: {}", message),
            SessionFailure::Validation(finding) => write!(f, "Generated code failed validation: {}", finding),
            SessionFailure::Infrastructure { message } => {
                write!(f, "Failed to save generated files: {}", message)
            }
        }
    }
}
