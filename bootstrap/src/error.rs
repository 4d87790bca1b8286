// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for Kea-Bootstrap

use thiserror::Error;

/// Result type alias for Kea-Bootstrap operations
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Errors that can occur while bootstrapping a host
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// An external command exited unsuccessfully
    #[error("Command '{command}' failed with {status}")]
    CommandFailed { command: String, status: String },

    /// An external command could not be spawned
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },

    /// No usable Python interpreter on PATH
    #[error("No Python interpreter found (tried {tried})")]
    InterpreterNotFound { tried: String },

    /// The invoking user's home directory is unknown
    #[error("Cannot determine the home directory (HOME is not set)")]
    HomeNotFound,

    /// Reading from the terminal failed
    #[error("Prompt failed: {0}")]
    Prompt(std::io::Error),

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
