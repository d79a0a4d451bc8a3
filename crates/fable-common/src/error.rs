//! Error types for Project Fable.
//!
//! Only content and configuration problems surface as errors. Per-action
//! failures during play (cooldowns, missing resources) are reported as
//! results by the gameplay crate and never abort a session.

use thiserror::Error;

/// Top-level error type for Fable operations.
#[derive(Debug, Error)]
pub enum FableError {
    /// Malformed content definition
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Content-authoring errors, raised when definitions are loaded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// A required field is absent
    #[error("{context}: missing required field `{field}`")]
    MissingField {
        /// What was being loaded (e.g. "ability fireball")
        context: String,
        /// Name of the missing field
        field: &'static str,
    },

    /// Stat or modifier name outside the closed vocabulary
    #[error("{context}: unknown stat `{name}`")]
    UnknownStat {
        /// What was being loaded
        context: String,
        /// The offending name
        name: String,
    },

    /// Unknown enum label (effect category, damage type, actor kind)
    #[error("{context}: unknown {kind} `{value}`")]
    UnknownVariant {
        /// What was being loaded
        context: String,
        /// Which vocabulary was expected
        kind: &'static str,
        /// The offending label
        value: String,
    },

    /// A numeric field outside its valid range
    #[error("{context}: invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// What was being loaded
        context: String,
        /// Field name
        field: &'static str,
        /// Human-readable reason
        reason: String,
    },

    /// The source text could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The config text is not valid TOML for the schema
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A tunable is outside its valid range
    #[error("config value `{key}` out of range: {reason}")]
    OutOfRange {
        /// Config key
        key: &'static str,
        /// Human-readable reason
        reason: String,
    },
}

/// Result type alias for Fable operations.
pub type FableResult<T> = Result<T, FableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_messages() {
        let err = DataError::MissingField {
            context: "actor goblin".to_string(),
            field: "name",
        };
        assert_eq!(err.to_string(), "actor goblin: missing required field `name`");

        let err = DataError::UnknownStat {
            context: "effect Poison".to_string(),
            name: "luck".to_string(),
        };
        assert_eq!(err.to_string(), "effect Poison: unknown stat `luck`");
    }

    #[test]
    fn test_wrapping_into_top_level() {
        let err: FableError = ConfigError::Parse("bad".to_string()).into();
        assert!(matches!(err, FableError::Config(_)));
        assert_eq!(err.to_string(), "Config error: failed to parse config: bad");
    }
}
