//! Directive values as stored in a policy and as accepted from callers.

use serde_json::Value;

use crate::error::{PolicyError, PolicyResult};

/// A stored directive value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveValue {
    /// Boolean directives such as `upgrade-insecure-requests`
    Flag(bool),
    /// Every other grammar: sources, tokens, media types, URIs
    Tokens(Vec<String>),
}

impl DirectiveValue {
    pub fn is_empty(&self) -> bool {
        match self {
            DirectiveValue::Flag(enabled) => !enabled,
            DirectiveValue::Tokens(tokens) => tokens.is_empty(),
        }
    }

    pub fn tokens(&self) -> Option<&[String]> {
        match self {
            DirectiveValue::Tokens(tokens) => Some(tokens),
            DirectiveValue::Flag(_) => None,
        }
    }
}

/// A value passed to `set_directive` / `append_directive`.
///
/// Strings are split on single spaces, so `"'self' example.com"` and
/// `["'self'", "example.com"]` are equivalent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveInput {
    Text(String),
    Tokens(Vec<String>),
    Flag(bool),
}

impl DirectiveInput {
    pub fn empty() -> Self {
        DirectiveInput::Tokens(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DirectiveInput::Text(text) => text.is_empty(),
            DirectiveInput::Tokens(tokens) => tokens.is_empty(),
            DirectiveInput::Flag(enabled) => !enabled,
        }
    }

    /// Truthiness used when the target directive is boolean.
    pub(crate) fn truthy(&self) -> bool {
        !self.is_empty()
    }

    /// Token form of the input; `None` for flags.
    pub(crate) fn into_tokens(self) -> Option<Vec<String>> {
        match self {
            DirectiveInput::Text(text) => Some(split_tokens(&text)),
            DirectiveInput::Tokens(tokens) => Some(tokens),
            DirectiveInput::Flag(_) => None,
        }
    }
}

/// Split a space-delimited value. Only single spaces delimit, matching how values are
/// written in a header.
pub fn split_tokens(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(' ').map(str::to_string).collect()
}

impl From<&str> for DirectiveInput {
    fn from(value: &str) -> Self {
        DirectiveInput::Text(value.to_string())
    }
}

impl From<String> for DirectiveInput {
    fn from(value: String) -> Self {
        DirectiveInput::Text(value)
    }
}

impl From<&String> for DirectiveInput {
    fn from(value: &String) -> Self {
        DirectiveInput::Text(value.clone())
    }
}

impl From<Vec<String>> for DirectiveInput {
    fn from(value: Vec<String>) -> Self {
        DirectiveInput::Tokens(value)
    }
}

impl From<Vec<&str>> for DirectiveInput {
    fn from(value: Vec<&str>) -> Self {
        DirectiveInput::Tokens(value.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for DirectiveInput {
    fn from(value: &[String]) -> Self {
        DirectiveInput::Tokens(value.to_vec())
    }
}

impl From<&[&str]> for DirectiveInput {
    fn from(value: &[&str]) -> Self {
        DirectiveInput::Tokens(value.iter().map(|token| token.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for DirectiveInput {
    fn from(value: [&str; N]) -> Self {
        DirectiveInput::Tokens(value.iter().map(|token| token.to_string()).collect())
    }
}

impl From<bool> for DirectiveInput {
    fn from(value: bool) -> Self {
        DirectiveInput::Flag(value)
    }
}

impl DirectiveInput {
    /// Conversion at the configuration boundary, where values arrive untyped.
    ///
    /// Strings, arrays of strings, booleans and `null` (empty) are accepted; numbers,
    /// objects and arrays holding anything but strings are rejected.
    pub fn from_json(directive: &str, value: Value) -> PolicyResult<Self> {
        match value {
            Value::Null => Ok(DirectiveInput::empty()),
            Value::Bool(enabled) => Ok(DirectiveInput::Flag(enabled)),
            Value::String(text) => Ok(DirectiveInput::Text(text)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(token) => Ok(token),
                    other => Err(PolicyError::invalid_value(
                        directive,
                        format!("expected string token, found {}", other),
                    )),
                })
                .collect::<PolicyResult<Vec<_>>>()
                .map(DirectiveInput::Tokens),
            other => Err(PolicyError::invalid_value(
                directive,
                format!("expected string or array, found {}", other),
            )),
        }
    }
}
