//! Generation prompt construction.
//!
//! The prompt asks for the whole application in the sentinel marker format
//! that [`crate::boundary`] parses.

use codeforge_core::config::GenerationConfig;
use codeforge_providers::CompletionRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One uploaded requirements document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementDocument {
    pub filename: String,
    pub content: String,
}

impl RequirementDocument {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// Everything known about a project when generation starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationContext {
    pub documents: Vec<RequirementDocument>,
    /// Result of the earlier analysis step
    pub analysis: Option<Value>,
    /// Answers to clarifying questions
    pub answers: Map<String, Value>,
    pub preferences: Map<String, Value>,
}

const FORMAT_INSTRUCTIONS: &str = "Generate a complete application with:
1. All necessary source code files
2. Configuration files (package.json, .env.example, etc.)
3. README.md with setup instructions
4. Database schema (if needed)
5. API documentation (if applicable)

Format your response as a series of files:
=== FILENAME: path/to/file.ext ===
[file content here]
=== END FILE ===

Make the code production-ready, well-commented, and follow best practices.";

impl GenerationContext {
    /// Documents rendered as `=== name ===` sections separated by blank lines.
    pub fn requirements(&self) -> String {
        self.documents
            .iter()
            .map(|doc| format!("=== {} ===\n{}", doc.filename, doc.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// The single user turn sent to the provider.
    pub fn prompt(&self) -> String {
        let mut sections = vec![
            "You are an expert software developer. Generate a complete, production-ready application based on these requirements.".to_string(),
            format!("Requirements:\n{}", self.requirements()),
        ];

        if let Some(analysis) = &self.analysis {
            sections.push(format!("Analysis:\n{:#}", analysis));
        }
        if !self.answers.is_empty() {
            sections.push(format!("User Answers:\n{:#}", Value::Object(self.answers.clone())));
        }
        if !self.preferences.is_empty() {
            sections.push(format!("Preferences:\n{:#}", Value::Object(self.preferences.clone())));
        }

        sections.push(FORMAT_INSTRUCTIONS.to_string());
        sections.join("\n\n")
    }

    pub fn to_request(&self, config: &GenerationConfig) -> CompletionRequest {
        CompletionRequest {
            model: config.model.clone(),
            system: None,
            prompt: self.prompt(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}
