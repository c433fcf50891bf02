//! Error types for `roundkeeper`
//!
//! A single hierarchy covers configuration loading, match execution and
//! rule-module failures, with a stable mapping onto process exit codes.

use std::path::PathBuf;
use thiserror::Error;

use crate::phase::MatchPhase;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `roundkeeper` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Match error (missing capability, failed condition poll)
    pub const MATCH_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `roundkeeper` operations.
///
/// Aggregates all domain-specific errors and maps each onto an exit code.
#[derive(Debug, Error)]
pub enum RoundKeeperError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Match execution error
    #[error(transparent)]
    Match(#[from] MatchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RoundKeeperError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Match(_) => ExitCode::MATCH_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Required field is missing from configuration
    #[error("missing required field '{field}' at {location}")]
    MissingRequired {
        /// Name of the missing field
        field: String,
        /// Location in the configuration (e.g., "rules.bomb_defusal")
        location: String,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the configuration where it was referenced
        location: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "rules.round_limit.max_rounds")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents configuration from being used
    Error,
    /// Warning - potential issue that does not prevent configuration loading
    Warning,
}

// ============================================================================
// Match Errors
// ============================================================================

/// Errors raised by the match host.
///
/// Startup validation, rejected external commands and failed condition
/// polls all surface here. Failures inside an `on` stage do not: those are
/// collected into a [`crate::phase::DispatchReport`] and logged.
#[derive(Debug, Error)]
pub enum MatchError {
    /// A module or single-instance collaborator required by another module is absent
    #[error("missing required capability '{name}'")]
    MissingCapability {
        /// Name of the missing module or collaborator
        name: String,
    },

    /// An external caller referenced a player the directory does not know
    #[error("player not found: {player}")]
    PlayerNotFound {
        /// Rendered player reference (id or connection)
        player: String,
    },

    /// A command arrived in a phase where it has no meaning
    #[error("'{action}' is not allowed during {phase}")]
    OutOfPhase {
        /// Command name
        action: &'static str,
        /// Phase the match was in
        phase: MatchPhase,
    },

    /// A round-end or game-end condition poll failed
    #[error("condition poll failed in module '{module}': {source}")]
    ConditionFailed {
        /// Module whose poll failed
        module: String,
        /// Underlying rule error
        #[source]
        source: RuleError,
    },

    /// A module refused a command, e.g. a plant from the defending team
    #[error("'{action}' refused by module '{module}': {source}")]
    Refused {
        /// Command name
        action: &'static str,
        /// Module that refused it
        module: String,
        /// Why it was refused
        #[source]
        source: RuleError,
    },

    /// The host task is gone; the command could not be delivered
    #[error("match host is no longer running")]
    EngineClosed,
}

// ============================================================================
// Rule Errors
// ============================================================================

/// Errors returned by fallible rule-module callbacks.
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    /// Callback failed
    #[error("rule callback failed: {0}")]
    Failed(String),

    /// A collaborator the rule depends on refused the operation
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// The acting player may not do this right now
    #[error("{0}")]
    InvalidActor(String),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `roundkeeper` operations.
pub type Result<T> = std::result::Result<T, RoundKeeperError>;

// ============================================================================
// Tests
// ============================================================================
