//! Configuration Error Types
//!
//! Specific, actionable error messages for configuration loading and validation.
//! Every variant is fatal at startup.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// The layered sources could not be read or merged
    #[error("Failed to load configuration from '{config_directory}': {error}")]
    LoadError {
        config_directory: PathBuf,
        error: String,
    },

    /// The merged configuration does not deserialize into the expected shape
    #[error("Failed to parse configuration: {error}")]
    ParseError { error: String },
}

impl ConfigurationError {
    /// Create a missing required field error
    pub fn missing_required_field<F: Into<String>, C: Into<String>>(field: F, context: C) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, V: Into<String>, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    /// Create a load error
    pub fn load_error<E: std::fmt::Display>(config_directory: PathBuf, error: E) -> Self {
        Self::LoadError {
            config_directory,
            error: error.to_string(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;
