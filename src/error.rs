//! Error types for tasklens

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tasklens operations
pub type Result<T> = std::result::Result<T, LensError>;

/// Main error type for tasklens
#[derive(Error, Debug)]
pub enum LensError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Template parsing or evaluation errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find taskfile (searched: {0})")]
    NotFound(String),

    #[error("Invalid taskfile: {0}")]
    Invalid(String),

    #[error("Task '{0}' is not defined")]
    TaskNotFound(String),

    #[error("Failed to include file '{path}': {error}")]
    IncludeFile { path: PathBuf, error: String },

    #[error("Failed to load dotenv file '{path}': {error}")]
    DotenvFile { path: PathBuf, error: String },
}

/// Template parsing and evaluation errors
///
/// The two variants match the failure taxonomy of the tracer: a parse error
/// means the input never produced an expression tree; an exec error means
/// evaluation of a well-formed tree was refused (unknown function, bad
/// argument count, ...). The `Display` prefixes ("parse error:", "exec
/// error:") must stay stable: diagnostics pattern-match them in placeholder
/// output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("exec error: {0}")]
    Exec(String),
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for template operations
pub type TemplateResult<T> = std::result::Result<T, TemplateError>;
