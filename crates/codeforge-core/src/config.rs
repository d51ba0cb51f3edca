//! Configuration system for Codeforge.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// Main configuration struct for Codeforge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generation request settings
    pub generation: GenerationConfig,
    /// Extraction engine settings
    pub extraction: ExtractionConfig,
    /// Durable store settings
    pub storage: StorageConfig,
    /// Provider configurations
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Provider used for generation
    pub provider: String,
    /// Model to request
    pub model: String,
    /// Maximum tokens per generation
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8000,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Canonical entry artifact name
    pub entry_name: String,
    /// Expected size of a full generation in bytes; enables progress percentages
    pub expected_output_bytes: Option<usize>,
    /// Unwrap markdown code fences around whole artifacts
    pub strip_code_fences: bool,
    /// Largest accepted artifact
    pub max_artifact_bytes: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            entry_name: "index.html".to_string(),
            expected_output_bytes: None,
            strip_code_fences: true,
            max_artifact_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path; defaults under the data directory
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the database path.
    pub fn resolve_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("codeforge.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Anthropic configuration
    pub anthropic: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key (can be set directly or via environment)
    pub api_key: Option<String>,
    /// Environment variable name for API key
    pub api_key_env: Option<String>,
    /// Base URL (optional, for custom endpoints)
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key from either direct value or environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        if let Some(ref env_var) = self.api_key_env {
            if let Ok(key) = std::env::var(env_var) {
                return Some(key);
            }
        }
        None
    }
}

/// Validation result with multiple issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation issues
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Check if validation passed (no errors).
    pub fn is_ok(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Error).collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Warning).collect()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    /// Field path (e.g., "generation.max_tokens")
    pub field: String,
    pub message: String,
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Warnings don't prevent loading
    Warning,
    /// Errors prevent loading
    Error,
}

impl Config {
    /// Layered configuration: defaults, user file, project files, environment.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(Self::config_dir().join("config.toml")))
            .merge(Toml::file(".codeforge/config.toml"))
            // Project local config (gitignored)
            .merge(Toml::file(".codeforge/config.local.toml"))
            .merge(Env::prefixed("CODEFORGE_").split("__"))
    }

    /// Load configuration from all sources.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    /// Load and validate configuration.
    pub fn load_validated() -> Result<Self, Error> {
        let config = Self::load().map_err(|e| Error::Config(e.to_string()))?;
        config.into_validated()
    }

    /// Validate an already loaded configuration, logging warnings.
    pub fn into_validated(self) -> Result<Self, Error> {
        let result = self.validate();

        if !result.is_ok() {
            let errors: Vec<String> = result
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(Error::Config(format!(
                "Configuration validation failed:\n  {}",
                errors.join("\n  ")
            )));
        }

        for warning in result.warnings() {
            tracing::warn!("Config warning - {}: {}", warning.field, warning.message);
        }

        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.generation.model.is_empty() {
            result.add_error("generation.model", "Model name cannot be empty");
        }

        let valid_providers = ["anthropic"];
        if !valid_providers.contains(&self.generation.provider.as_str()) {
            result.add_error(
                "generation.provider",
                format!(
                    "Unknown provider '{}'. Valid values: {:?}",
                    self.generation.provider, valid_providers
                ),
            );
        }

        if self.generation.max_tokens == 0 {
            result.add_error("generation.max_tokens", "max_tokens must be greater than 0");
        }

        if self.generation.max_tokens > 64_000 {
            result.add_warning(
                "generation.max_tokens",
                "max_tokens is very high (> 64k), most models will reject it",
            );
        }

        if !(0.0..=1.0).contains(&self.generation.temperature) {
            result.add_error("generation.temperature", "temperature must be between 0.0 and 1.0");
        }

        let entry = self.extraction.entry_name.trim();
        if entry.is_empty() {
            result.add_error("extraction.entry_name", "entry_name cannot be empty");
        } else if entry.contains('/') {
            result.add_error("extraction.entry_name", "entry_name must be a bare file name");
        }

        if self.extraction.expected_output_bytes == Some(0) {
            result.add_error(
                "extraction.expected_output_bytes",
                "expected_output_bytes must be greater than 0 when set",
            );
        }

        if self.extraction.max_artifact_bytes == 0 {
            result.add_error("extraction.max_artifact_bytes", "max_artifact_bytes must be greater than 0");
        }

        if let Some(ref anthropic) = self.providers.anthropic {
            if anthropic.api_key.as_ref().map(|k| k.is_empty()).unwrap_or(false) {
                result.add_warning("providers.anthropic.api_key", "API key is empty string");
            }
            if let Some(ref base_url) = anthropic.base_url {
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    result.add_error(
                        "providers.anthropic.base_url",
                        "base_url must start with http:// or https://",
                    );
                }
            }
        }

        result
    }

    /// Render as TOML, for `codeforge config show`.
    pub fn to_toml_string(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Get the configuration directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("codeforge"))
            .unwrap_or_else(|| PathBuf::from("~/.config/codeforge"))
    }

    /// Get the data directory (for the artifact database).
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|p| p.join("codeforge"))
            .unwrap_or_else(|| PathBuf::from("~/.local/share/codeforge"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_ok(), "Default config should be valid: {:?}", result.issues);
    }

    #[test]
    fn test_invalid_max_tokens() {
        let mut config = Config::default();
        config.generation.max_tokens = 0;
        let result = config.validate();
        assert!(!result.is_ok());
        assert!(result.errors().iter().any(|e| e.field == "generation.max_tokens"));
    }

    #[test]
    fn test_entry_name_must_be_bare() {
        let mut config = Config::default();
        config.extraction.entry_name = "public/index.html".to_string();
        let result = config.validate();
        assert!(result.errors().iter().any(|e| e.field == "extraction.entry_name"));
    }

    #[test]
    fn test_high_max_tokens_is_warning() {
        let mut config = Config::default();
        config.generation.max_tokens = 100_000;
        let result = config.validate();
        assert!(result.is_ok());
        assert!(result.warnings().iter().any(|e| e.field == "generation.max_tokens"));
    }

    #[test]
    fn test_env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CODEFORGE_EXTRACTION__ENTRY_NAME", "main.html");
            jail.set_env("CODEFORGE_GENERATION__MAX_TOKENS", "4000");
            let config: Config = Config::figment().extract()?;
            assert_eq!(config.extraction.entry_name, "main.html");
            assert_eq!(config.generation.max_tokens, 4000);
            Ok(())
        });
    }

    #[test]
    fn test_project_file_is_layered() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir(".codeforge")?;
            jail.create_file(
                ".codeforge/config.toml",
                r#"
                [extraction]
                strip_code_fences = false
                expected_output_bytes = 40000
                "#,
            )?;
            let config: Config = Config::figment().extract()?;
            assert!(!config.extraction.strip_code_fences);
            assert_eq!(config.extraction.expected_output_bytes, Some(40000));
            assert_eq!(config.extraction.entry_name, "index.html");
            Ok(())
        });
    }
}
