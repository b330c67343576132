//! Environment variable utilities for safe and validated access.
//!
//! Handler options can be overlaid from the environment (see
//! [`HandlerOptions::from_env`](crate::handler::HandlerOptions::from_env)).
//! Values are trimmed, empty values count as unset, and typed values are
//! parsed with their [`FromStr`] implementation.

use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when accessing environment variables.
#[derive(Debug, Error)]
pub enum EnvVarError {
    /// Environment variable is not set
    #[error(
        "Environment variable '{name}' not found. Please set this variable in your .env file or environment."
    )]
    NotFound { name: String },

    /// Environment variable contains invalid UTF-8 characters
    #[error(
        "Environment variable '{name}' contains invalid UTF-8 characters. Please check the value."
    )]
    InvalidUtf8 { name: String },

    /// Environment variable is set but contains only whitespace or is empty
    #[error("Environment variable '{name}' is empty. Please provide a valid value.")]
    Empty { name: String },

    /// Environment variable is set but cannot be parsed into the expected type
    #[error("Environment variable '{name}' has an invalid value '{value}': {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Utility functions for safe environment variable handling.
///
/// # Examples
///
/// ```no_run
/// use servicebus::utils::EnvUtils;
///
/// if let Some(retries) = EnvUtils::get_optional_parsed_var::<u32>("SERVICEBUS_RETRY_TOTAL")? {
///     println!("Retrying up to {} times", retries);
/// }
///
/// if let Some(agent) = EnvUtils::get_optional_var("SERVICEBUS_USER_AGENT") {
///     println!("User agent prefix: {}", agent);
/// }
/// ```
pub struct EnvUtils;

impl EnvUtils {
    /// Gets an environment variable, trimmed and validated as non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`EnvVarError`] if:
    /// - The variable is not set ([`EnvVarError::NotFound`])
    /// - The variable is empty or contains only whitespace ([`EnvVarError::Empty`])
    /// - The variable contains invalid UTF-8 ([`EnvVarError::InvalidUtf8`])
    pub fn get_validated_var(name: &str) -> Result<String, EnvVarError> {
        match std::env::var(name) {
            Ok(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Err(EnvVarError::Empty {
                        name: name.to_string(),
                    })
                } else {
                    Ok(trimmed.to_string())
                }
            }
            Err(std::env::VarError::NotPresent) => Err(EnvVarError::NotFound {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(EnvVarError::InvalidUtf8 {
                name: name.to_string(),
            }),
        }
    }

    /// Gets an optional environment variable; missing, empty or invalid
    /// values all yield `None`.
    pub fn get_optional_var(name: &str) -> Option<String> {
        Self::get_validated_var(name).ok()
    }

    /// Gets and parses an environment variable.
    pub fn get_parsed_var<T>(name: &str) -> Result<T, EnvVarError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = Self::get_validated_var(name)?;
        value.parse().map_err(|e: T::Err| EnvVarError::Invalid {
            name: name.to_string(),
            reason: e.to_string(),
            value,
        })
    }

    /// Parses an environment variable if it is set.
    ///
    /// Unset or empty variables yield `Ok(None)`; a value that is present but
    /// does not parse is an error rather than being silently ignored.
    pub fn get_optional_parsed_var<T>(name: &str) -> Result<Option<T>, EnvVarError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match Self::get_parsed_var(name) {
            Ok(value) => Ok(Some(value)),
            Err(EnvVarError::NotFound { .. } | EnvVarError::Empty { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
