//! Validation findings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of structural violation found after extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    MissingEntry,
    SyntaxError,
    StructuralError,
    MissingReference,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::MissingEntry => "missing-entry",
            FindingKind::SyntaxError => "syntax-error",
            FindingKind::StructuralError => "structural-error",
            FindingKind::MissingReference => "missing-reference",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violation reported by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub kind: FindingKind,
    /// Offending artifact name
    #[serde(rename = "filename")]
    pub artifact: String,
    /// Human-readable detail
    pub detail: String,
}

impl ValidationFinding {
    pub fn new(kind: FindingKind, artifact: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            artifact: artifact.into(),
            detail: detail.into(),
        }
    }

    pub fn missing_entry(entry_name: &str) -> Self {
        Self::new(
            FindingKind::MissingEntry,
            entry_name,
            format!("no entry artifact named '{}' was produced", entry_name),
        )
    }

    pub fn syntax_error(artifact: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(FindingKind::SyntaxError, artifact, detail)
    }

    pub fn structural_error(artifact: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(FindingKind::StructuralError, artifact, detail)
    }

    pub fn missing_reference(artifact: impl Into<String>, reference: &str) -> Self {
        Self::new(
            FindingKind::MissingReference,
            artifact,
            format!("references '{}' which was not generated", reference),
        )
    }
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}: {}", self.kind, self.artifact, self.detail)
    }
}
