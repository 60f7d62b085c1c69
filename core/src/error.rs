//! Structured error types for notch
//!
//! Every fallible engine operation returns [`NotchError`]. The session turns
//! non-fatal errors into user notifications at the command boundary; only
//! programming-contract violations are allowed to escape the loop.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for engine operations
#[derive(Error, Debug)]
pub enum NotchError {
    // =========================================================================
    // Command Errors
    // =========================================================================
    /// Missing or malformed command parameters
    #[error("{message}")]
    Validation { message: String },

    /// Command name not known to the parser
    #[error("unknown command: {name}")]
    UnknownCommand { name: String },

    /// User aborted an interactive prompt
    #[error("canceled")]
    CancelledPrompt,

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// Store rejected a mutation
    #[error("index in read-only mode")]
    ReadOnly,

    /// Store is locked by another writer
    #[error("index locked")]
    Locked,

    /// Query string could not be parsed
    #[error("invalid query '{query}': {reason}")]
    Parse { query: String, reason: String },

    // =========================================================================
    // Process Errors
    // =========================================================================
    /// External command exited unsuccessfully
    #[error("{command} exited with {}", describe_code(.code))]
    ProcessFailure { command: String, code: Option<i32> },

    /// External command could not be started
    #[error("failed to run {command}: {reason}")]
    SpawnFailure { command: String, reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration file
    #[error("invalid configuration {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// A command referenced a buffer that is no longer registered
    #[error("buffer not found: {description}")]
    BufferNotFound { description: String },

    /// Engine reached a state its invariants exclude
    #[error("unexpected state: {description}")]
    UnexpectedState { description: String },

    // =========================================================================
    // External Error Wrappers (transparent)
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),
}

impl NotchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unexpected(description: impl Into<String>) -> Self {
        Self::UnexpectedState {
            description: description.into(),
        }
    }

    /// Check if error is transient and worth a scheduled retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Locked)
    }

    /// Check if error indicates an engine bug rather than an environmental condition
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BufferNotFound { .. } | Self::UnexpectedState { .. }
        )
    }

    /// Get a user-facing notification text
    pub fn user_message(&self) -> String {
        match self {
            Self::ReadOnly => "index in read-only mode".to_string(),
            Self::Locked => "index locked".to_string(),
            Self::CancelledPrompt => "canceled".to_string(),
            Self::Io(err) => format!("I/O failure: {}", err),
            _ => self.to_string(),
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

/// Result type alias using NotchError
pub type Result<T> = std::result::Result<T, NotchError>;

/// Extension trait for turning a missing value into a contract violation
pub trait OptionExt<T> {
    fn ok_or_buffer_missing(self, description: impl Into<String>) -> Result<T>;
    fn ok_or_invalid(self, message: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_buffer_missing(self, description: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| NotchError::BufferNotFound {
            description: description.into(),
        })
    }

    fn ok_or_invalid(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| NotchError::validation(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_lock_is_retryable() {
        assert!(NotchError::Locked.is_retryable());
        assert!(!NotchError::ReadOnly.is_retryable());
        assert!(!NotchError::validation("empty query").is_retryable());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(NotchError::unexpected("dangling task").is_fatal());
        assert!(NotchError::BufferNotFound {
            description: "envelope".to_string()
        }
        .is_fatal());
        assert!(!NotchError::CancelledPrompt.is_fatal());
        assert!(!NotchError::ProcessFailure {
            command: "vi".to_string(),
            code: Some(1)
        }
        .is_fatal());
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(NotchError::ReadOnly.user_message(), "index in read-only mode");
        assert_eq!(NotchError::CancelledPrompt.user_message(), "canceled");
        assert_eq!(
            NotchError::validation("no accounts set").user_message(),
            "no accounts set"
        );
    }

    #[test]
    fn test_process_failure_message() {
        let err = NotchError::ProcessFailure {
            command: "sendmail -t".to_string(),
            code: Some(75),
        };
        assert_eq!(err.user_message(), "sendmail -t exited with code 75");

        let err = NotchError::SpawnFailure {
            command: "vi draft".to_string(),
            reason: "no such program".to_string(),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.user_message(), "failed to run vi draft: no such program");
    }

    #[test]
    fn test_option_ext() {
        let opt: Option<i32> = None;
        let result = opt.ok_or_buffer_missing("search buffer");
        assert!(matches!(result, Err(NotchError::BufferNotFound { .. })));

        let opt: Option<i32> = None;
        let result = opt.ok_or_invalid("no thread selected");
        assert!(matches!(result, Err(NotchError::Validation { .. })));
    }
}
