use palisade_policy::PolicyError;
use thiserror::Error;

/// ConfigError represents everything that can go wrong turning settings into policies
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings document could not be parsed
    #[error("Settings parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A policy operation rejected a directive or value
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// A URI parsed but cannot be used as a source
    #[error("Invalid URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Source that is neither a host nor a bare scheme
    #[error("Invalid domain or protocol provided for {directive}: {source_expression}")]
    InvalidSource {
        directive: String,
        source_expression: String,
    },

    /// Flag outside the supported keyword set, or on a directive that takes none
    #[error("Invalid flag provided for {directive}: {flag}")]
    InvalidFlag { directive: String, flag: String },

    /// Malformed entry in a media type list
    #[error("Invalid MIME-Type provided for {directive}: {media_type}")]
    InvalidMediaType { directive: String, media_type: String },

    /// Reporting handler options failed validation
    #[error("Invalid reporting configuration: {0}")]
    InvalidReporting(String),
}

impl ConfigError {
    /// Returns true if the settings parsed but hold a value that cannot be used
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            ConfigError::InvalidSource { .. }
                | ConfigError::InvalidFlag { .. }
                | ConfigError::InvalidMediaType { .. }
                | ConfigError::InvalidReporting(_)
                | ConfigError::InvalidUri { .. }
                | ConfigError::Url(_)
                | ConfigError::Policy(_)
        )
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
