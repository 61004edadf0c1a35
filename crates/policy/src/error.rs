//! Errors raised while building a Content-Security-Policy.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Invalid directive name provided: {0}")]
    InvalidDirective(String),

    #[error("Invalid value provided for directive {directive}: {reason}")]
    InvalidValue {
        directive: String,
        reason: String,
    },

    #[error("Directive is not set: {0}")]
    NotSet(String),

    #[error("Specified hash algorithm is not supported: {0}")]
    UnsupportedHashAlgorithm(String),
}

impl PolicyError {
    pub(crate) fn invalid_value(directive: &str, reason: impl Into<String>) -> Self {
        PolicyError::InvalidValue {
            directive: directive.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error stems from a directive name outside the registry
    pub fn is_invalid_directive(&self) -> bool {
        matches!(self, PolicyError::InvalidDirective(_))
    }

    /// Returns true if the error stems from the shape of a supplied value
    pub fn is_invalid_value(&self) -> bool {
        matches!(self, PolicyError::InvalidValue { .. })
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;
