//! Error types for the Promptab core library.
//!
//! Every fallible ledger or aggregator operation returns a [`PromptabError`]
//! carrying a stable error code, so handler layers can map failures onto
//! HTTP statuses without matching on message text.
//!
//! # Error Codes Reference
//!
//! | Code Range | Category | Description |
//! |------------|----------|-------------|
//! | E2001-E2099 | Config | Config file, environment and validation errors |
//! | E4001-E4099 | Session | Session lookup and status transition errors |
//! | E7001-E7099 | Variant | Primary metric and variant lookup errors |
//! | E9001-E9099 | General | Internal, IO, serialization and validation errors |

use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// The main error type for the Promptab core library.
#[derive(Debug, Error)]
pub enum PromptabError {
    // ========================================================================
    // Configuration Errors (E2001-E2099)
    // ========================================================================
    /// Configuration file parse error
    #[error("[E2001] Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// Invalid configuration value
    #[error("[E2002] Invalid configuration value for '{key}': {message}")]
    InvalidConfigValue { key: String, message: String },

    /// Configuration error (generic)
    #[error("[E2003] Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Session Errors (E4001-E4099)
    // ========================================================================
    /// Session not present in the ledger
    #[error("[E4001] Session not found: {0}")]
    SessionNotFound(String),

    /// Status change outside the allowed transition table
    #[error("[E4002] Invalid session status transition from {from} to {to}")]
    InvalidSessionStatusTransition { from: String, to: String },

    // ========================================================================
    // Variant Errors (E7001-E7099)
    // ========================================================================
    /// Primary metric name not recognised (strict mode only)
    #[error("[E7001] Unknown primary metric: {0}")]
    UnknownMetric(String),

    /// Variant identifier not present in the result set
    #[error("[E7002] Variant not found: {0}")]
    VariantNotFound(String),

    // ========================================================================
    // General Errors (E9001-E9099)
    // ========================================================================
    #[error("[E9001] Internal error: {0}")]
    Internal(String),

    #[error("[E9002] Validation error: {0}")]
    ValidationError(String),

    #[error("[E9003] IO error: {0}")]
    IoError(String),

    #[error("[E9004] Serialization error: {0}")]
    SerializationError(String),
}

pub type PromptabResult<T> = Result<T, PromptabError>;

impl From<serde_json::Error> for PromptabError {
    fn from(err: serde_json::Error) -> Self {
        PromptabError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for PromptabError {
    fn from(err: serde_yaml::Error) -> Self {
        PromptabError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for PromptabError {
    fn from(err: std::io::Error) -> Self {
        PromptabError::IoError(err.to_string())
    }
}

impl From<config::ConfigError> for PromptabError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => PromptabError::InvalidConfigValue {
                key,
                message: "required value is missing".to_string(),
            },
            config::ConfigError::FileParse { uri, cause } => PromptabError::ConfigParseError(
                format!("{}: {}", uri.unwrap_or_else(|| "<unknown>".to_string()), cause),
            ),
            other => PromptabError::Config(other.to_string()),
        }
    }
}

impl PromptabError {
    pub fn session_not_found(id: impl fmt::Display) -> Self {
        PromptabError::SessionNotFound(id.to_string())
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PromptabError::ConfigParseError(_)
                | PromptabError::InvalidConfigValue { .. }
                | PromptabError::Config(_)
        )
    }

    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            PromptabError::SessionNotFound(_)
                | PromptabError::InvalidSessionStatusTransition { .. }
        )
    }

    pub fn is_variant_error(&self) -> bool {
        matches!(
            self,
            PromptabError::UnknownMetric(_) | PromptabError::VariantNotFound(_)
        )
    }

    /// Whether the failure is the caller's fault (bad id, bad input)
    /// rather than a problem inside the process.
    pub fn is_client_error(&self) -> bool {
        self.is_session_error()
            || self.is_variant_error()
            || matches!(self, PromptabError::ValidationError(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            PromptabError::ConfigParseError(_) => "E2001",
            PromptabError::InvalidConfigValue { .. } => "E2002",
            PromptabError::Config(_) => "E2003",
            PromptabError::SessionNotFound(_) => "E4001",
            PromptabError::InvalidSessionStatusTransition { .. } => "E4002",
            PromptabError::UnknownMetric(_) => "E7001",
            PromptabError::VariantNotFound(_) => "E7002",
            PromptabError::Internal(_) => "E9001",
            PromptabError::ValidationError(_) => "E9002",
            PromptabError::IoError(_) => "E9003",
            PromptabError::SerializationError(_) => "E9004",
        }
    }

    pub fn user_suggestion(&self) -> Option<&'static str> {
        match self {
            PromptabError::ConfigParseError(_) => {
                Some("Check the TOML syntax of promptab.toml or ~/.config/promptab/config.toml")
            }
            PromptabError::InvalidConfigValue { .. } => {
                Some("Fix the offending value or remove it to fall back to the default")
            }
            PromptabError::SessionNotFound(_) => Some(
                "The session may have been deleted or swept by cleanup; create a new session",
            ),
            PromptabError::InvalidSessionStatusTransition { .. } => {
                Some("Only active sessions can be completed or aborted")
            }
            PromptabError::UnknownMetric(_) => {
                Some("Use one of: cost, latency, tokens, or disable aggregator.strict_metrics")
            }
            PromptabError::VariantNotFound(_) => {
                Some("Check the variant ids against the variant_id field of the results")
            }
            PromptabError::SerializationError(_) => {
                Some("Make sure the input is valid JSON/YAML in the documented shape")
            }
            _ => None,
        }
    }

    /// Log this error with a severity matching who caused it.
    pub fn log(&self) {
        let code = self.error_code();
        let suggestion = self.user_suggestion();

        if self.is_client_error() {
            warn!(
                error_code = %code,
                suggestion = suggestion,
                "Request rejected: {}",
                self
            );
        } else {
            error!(
                error_code = %code,
                suggestion = suggestion,
                "Error occurred: {}",
                self
            );
        }
    }
}

/// Display wrapper for printing errors in a terminal.
pub struct CliErrorDisplay<'a> {
    error: &'a PromptabError,
    show_code: bool,
    show_suggestion: bool,
}

impl<'a> CliErrorDisplay<'a> {
    pub fn new(error: &'a PromptabError) -> Self {
        Self {
            error,
            show_code: true,
            show_suggestion: true,
        }
    }

    pub fn without_code(mut self) -> Self {
        self.show_code = false;
        self
    }

    pub fn without_suggestion(mut self) -> Self {
        self.show_suggestion = false;
        self
    }
}

impl<'a> fmt::Display for CliErrorDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.error.to_string();
        // Strip the "[E....] " prefix when the code is hidden
        let message = if !self.show_code {
            message
                .split_once("] ")
                .map(|(_, rest)| rest.to_string())
                .unwrap_or(message)
        } else {
            message
        };

        write!(f, "{}", message)?;

        if self.show_suggestion {
            if let Some(suggestion) = self.error.user_suggestion() {
                write!(f, "\n  hint: {}", suggestion)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PromptabError::SessionNotFound("abc".to_string());
        assert_eq!(err.to_string(), "[E4001] Session not found: abc");

        let err = PromptabError::InvalidSessionStatusTransition {
            from: "aborted".to_string(),
            to: "completed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "[E4002] Invalid session status transition from aborted to completed"
        );
    }

    #[test]
    fn test_error_categorization() {
        assert!(PromptabError::SessionNotFound("x".into()).is_session_error());
        assert!(PromptabError::Config("x".into()).is_config_error());
        assert!(PromptabError::UnknownMetric("x".into()).is_variant_error());
        assert!(PromptabError::ValidationError("x".into()).is_client_error());
        assert!(!PromptabError::Internal("x".into()).is_client_error());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(PromptabError::ConfigParseError("x".into()).error_code(), "E2001");
        assert_eq!(PromptabError::SessionNotFound("x".into()).error_code(), "E4001");
        assert_eq!(PromptabError::UnknownMetric("x".into()).error_code(), "E7001");
        assert_eq!(
            PromptabError::SerializationError("x".into()).error_code(),
            "E9004"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: PromptabError = json_err.into();
        assert!(matches!(err, PromptabError::SerializationError(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err: PromptabError = io_err.into();
        assert!(matches!(err, PromptabError::IoError(_)));
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_cli_error_display() {
        let err = PromptabError::SessionNotFound("abc".to_string());

        let full = CliErrorDisplay::new(&err).to_string();
        assert!(full.starts_with("[E4001]"));
        assert!(full.contains("hint:"));

        let bare = CliErrorDisplay::new(&err)
            .without_code()
            .without_suggestion()
            .to_string();
        assert_eq!(bare, "Session not found: abc");
    }

    #[test]
    fn test_log_handles_client_and_server_errors() {
        let client = PromptabError::session_not_found("abc");
        let server = PromptabError::Internal("lock poisoned".to_string());

        assert!(client.is_client_error());
        assert!(!server.is_client_error());
        client.log();
        server.log();
    }
}
