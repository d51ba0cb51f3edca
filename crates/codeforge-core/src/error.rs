//! Error types for Codeforge.
//!
//! Structured errors with context and recovery suggestions. Failures that
//! end an extraction session are modelled separately by
//! [`SessionFailure`](crate::session::SessionFailure).

use thiserror::Error;

/// Result type alias using Codeforge's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of Codeforge.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed generation context or event payload
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The artifact store failed
    #[error("Artifact store error: {0}")]
    Database(String),

    /// Unknown project
    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Config(_) => Some("Run 'codeforge config validate' to see what is wrong"),
            Error::Provider(e) => e.recovery_suggestion(),
            Error::Database(_) => Some("Check that storage.database_path points to a writable location"),
            Error::NotFound(_) => Some("Use 'codeforge project list' to see known projects"),
            Error::Json(_) => Some("The context file must be a JSON object with analysis, answers or preferences"),
            _ => None,
        }
    }

    /// The generation provider has no credentials.
    pub fn provider_not_configured(provider: &str) -> Self {
        Error::Provider(ProviderError::NotConfigured {
            provider: provider.to_string(),
            env_var: match provider {
                "anthropic" => Some("ANTHROPIC_API_KEY".to_string()),
                _ => None,
            },
        })
    }
}

/// Failures talking to the generation service.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Generation provider '{provider}' has no API key")]
    NotConfigured {
        provider: String,
        env_var: Option<String>,
    },

    /// The service rejected the request
    #[error("{provider} rejected the generation request ({status}): {message}")]
    ApiError {
        provider: String,
        status: u16,
        message: String,
    },

    /// The token stream broke or reported an error event
    #[error("{provider} stream failed: {message}")]
    StreamError { provider: String, message: String },

    #[error("Could not reach {provider}: {message}")]
    NetworkError { provider: String, message: String },
}

impl ProviderError {
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            ProviderError::NotConfigured {
                env_var: Some(_), ..
            } => Some("Export the API key or set providers.anthropic.api_key"),
            ProviderError::NotConfigured { .. } => Some("Add a [providers.anthropic] section to config.toml"),
            ProviderError::ApiError { status: 401 | 403, .. } => Some("The API key was refused; check it is current"),
            ProviderError::ApiError { status: 429, .. } => Some("Rate limited; retry the generation later"),
            ProviderError::ApiError {
                status: 500..=599, ..
            } => Some("The generation service is unavailable; retry later"),
            ProviderError::StreamError { .. } => {
                Some("Nothing was committed; rerun the generation or replay a saved transcript")
            }
            ProviderError::NetworkError { .. } => Some("Check network access to providers.anthropic.base_url"),
            _ => None,
        }
    }

    pub fn api_error(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        ProviderError::ApiError {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a mid-stream error.
    pub fn stream_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::StreamError {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Render an error followed by its hint, if any.
pub fn format_error_with_suggestion(error: &Error) -> String {
    match error.recovery_suggestion() {
        Some(hint) => format!("{}\n  hint: {}", error, hint),
        None => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_not_configured() {
        let err = Error::provider_not_configured("anthropic");
        assert!(err.to_string().contains("anthropic"));
        assert!(err.recovery_suggestion().unwrap().contains("API key"));
    }

    #[test]
    fn test_api_error() {
        let err = ProviderError::api_error("anthropic", 429, "Rate limited");
        assert!(err.to_string().contains("429"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_format_with_suggestion() {
        let err = Error::NotFound("p-1".to_string());
        let formatted = format_error_with_suggestion(&err);
        assert!(formatted.starts_with("Project not found: p-1"));
        assert!(formatted.contains("hint: Use 'codeforge project list'"));
    }

    #[test]
    fn test_invalid_input_has_no_hint() {
        let err = Error::InvalidInput("empty".to_string());
        assert_eq!(format_error_with_suggestion(&err), "Invalid input: empty");
    }
}
