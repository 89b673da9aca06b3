//! Custom error types for worktrack.
//!
//! Parsing and lookup failures abort the single requested operation.
//! Consistency problems found by the validator are *not* errors; they are
//! returned as [`crate::validation::Issue`] values.

use std::path::PathBuf;
use thiserror::Error;

/// What kind of thing a [`WorktrackError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// A work unit identifier.
    WorkUnit,
    /// A task path inside a work unit.
    Task,
    /// A subtask caption inside a task.
    Subtask,
    /// A document section.
    Section,
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkUnit => write!(f, "Work unit"),
            Self::Task => write!(f, "Task"),
            Self::Subtask => write!(f, "Subtask"),
            Self::Section => write!(f, "Section"),
        }
    }
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(": {}", p.display()))
        .unwrap_or_default()
}

/// Main error type for worktrack operations
#[derive(Error, Debug)]
pub enum WorktrackError {
    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// Identifier, task path, or subtask caption does not exist
    #[error("{kind} not found: {key}")]
    NotFound { kind: LookupKind, key: String },

    // =========================================================================
    // Document Errors
    // =========================================================================
    /// Document has no `ID` field
    #[error("Document has no ID field{}", path_suffix(.path))]
    MissingIdentifier { path: Option<PathBuf> },

    /// Expected field or section missing where a mutation needs it
    #[error("Malformed document: {message}")]
    MalformedDocument { message: String },

    /// Completion is not an integer followed by a percent sign
    #[error("Invalid completion percentage: '{value}'")]
    InvalidPercentage { value: String },

    /// A value is not one of the recognized values for its field
    #[error("Invalid value for {field}: '{value}'")]
    InvalidValue { field: String, value: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Could not acquire the write lock on the work units directory
    #[error("Failed to acquire write lock {path}: {message}")]
    Lock { path: PathBuf, message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorktrackError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a not-found error
    pub fn not_found(kind: LookupKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Create a malformed document error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            message: message.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if the error came from the content of a record rather than the
    /// environment.
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            Self::MissingIdentifier { .. }
                | Self::MalformedDocument { .. }
                | Self::InvalidPercentage { .. }
                | Self::InvalidValue { .. }
        )
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 2,
            Self::MissingIdentifier { .. }
            | Self::MalformedDocument { .. }
            | Self::InvalidPercentage { .. }
            | Self::InvalidValue { .. } => 3,
            Self::Lock { .. } => 4,
            Self::Config { .. } | Self::InvalidConfig { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for worktrack results
pub type Result<T> = std::result::Result<T, WorktrackError>;
