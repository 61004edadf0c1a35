//! A single Content-Security-Policy header under construction.
//!
//! A `Policy` collects directive values over the life of one response and serializes
//! them into a header value. Mutations validate directive names against the
//! [`DirectiveRegistry`] before touching any state, so a failed call leaves the policy
//! unchanged.

use std::fmt;

use serde_json::Value;

use crate::directive::{DirectiveRegistry, SchemaKind};
use crate::error::{PolicyError, PolicyResult};
use crate::source_list::reduce_source_list;
use crate::value::{DirectiveInput, DirectiveValue};

pub const HEADER_NAME: &str = "Content-Security-Policy";
pub const REPORT_ONLY_HEADER_NAME: &str = "Content-Security-Policy-Report-Only";

/// One CSP header, enforced or report-only.
#[derive(Debug, Clone)]
pub struct Policy {
    registry: &'static DirectiveRegistry,
    report_only: bool,
    /// Directive values in insertion order
    directives: Vec<(&'static str, DirectiveValue)>,
}

impl Policy {
    /// Create an empty, enforced policy backed by the standard registry
    pub fn new() -> Self {
        Self::with_registry(DirectiveRegistry::standard())
    }

    /// Create an empty, enforced policy backed by the given registry
    pub fn with_registry(registry: &'static DirectiveRegistry) -> Self {
        Self {
            registry,
            report_only: false,
            directives: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'static DirectiveRegistry {
        self.registry
    }

    /// Set whether this policy is report-only
    pub fn report_only(&mut self, value: bool) {
        self.report_only = value;
    }

    pub fn is_report_only(&self) -> bool {
        self.report_only
    }

    /// Check if the policy currently holds the directive
    pub fn has_directive(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Get the stored value of a directive
    pub fn directive(&self, name: &str) -> PolicyResult<&DirectiveValue> {
        let name = self.registry.canonical_name(name)?;
        self.position(name)
            .map(|index| &self.directives[index].1)
            .ok_or_else(|| PolicyError::NotSet(name.to_string()))
    }

    /// Names of the directives currently held, in insertion order
    pub fn directive_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.directives.iter().map(|(name, _)| *name)
    }

    /// Add a directive to the policy, or replace an existing one.
    ///
    /// Boolean directives store the truthiness of `value`. For every other directive an
    /// empty value removes the directive.
    pub fn set_directive(
        &mut self,
        name: &str,
        value: impl Into<DirectiveInput>,
    ) -> PolicyResult<()> {
        let name = self.registry.canonical_name(name)?;
        let value = value.into();

        if self.registry.directive_schema(name)? == SchemaKind::Boolean {
            if value.truthy() {
                self.store(name, DirectiveValue::Flag(true));
            } else {
                self.remove(name);
            }
            log::trace!("Set boolean directive {} to {}", name, value.truthy());
            return Ok(());
        }

        // `false` clears like any other empty value
        if value.is_empty() {
            self.remove(name);
            log::trace!("Cleared directive {}", name);
            return Ok(());
        }
        let tokens = value.into_tokens().ok_or_else(|| {
            PolicyError::invalid_value(name, "boolean value for a non-boolean directive")
        })?;

        log::trace!("Set directive {} to {:?}", name, tokens);
        self.store(name, DirectiveValue::Tokens(tokens));
        Ok(())
    }

    /// Append values to a directive, creating it if needed.
    ///
    /// Values are concatenated without deduplication; duplicates are dropped when the
    /// header is serialized.
    pub fn append_directive(
        &mut self,
        name: &str,
        value: impl Into<DirectiveInput>,
    ) -> PolicyResult<()> {
        let name = self.registry.canonical_name(name)?;
        let schema = self.registry.directive_schema(name)?;
        let value = value.into();

        if schema == SchemaKind::Boolean {
            return Err(PolicyError::invalid_value(name, "boolean directives can only be set"));
        }
        let tokens = value.into_tokens().ok_or_else(|| {
            PolicyError::invalid_value(name, "boolean value for a non-boolean directive")
        })?;

        if tokens.is_empty() {
            // An empty optional token list is meaningful (bare `sandbox`)
            if schema == SchemaKind::OptionalTokenList && !self.has_directive(name) {
                self.store(name, DirectiveValue::Tokens(Vec::new()));
            }
            return Ok(());
        }

        log::trace!("Append to directive {}: {:?}", name, tokens);
        match self.position(name) {
            Some(index) => {
                // Only boolean directives hold a flag, and they were rejected above
                if let DirectiveValue::Tokens(existing) = &mut self.directives[index].1 {
                    existing.extend(tokens);
                }
            }
            None => self.directives.push((name, DirectiveValue::Tokens(tokens))),
        }
        Ok(())
    }

    /// `set_directive` for untyped values from configuration
    pub fn set_directive_json(&mut self, name: &str, value: Value) -> PolicyResult<()> {
        let name = self.registry.canonical_name(name)?;
        let input = DirectiveInput::from_json(name, value)?;
        self.set_directive(name, input)
    }

    /// `append_directive` for untyped values from configuration
    pub fn append_directive_json(&mut self, name: &str, value: Value) -> PolicyResult<()> {
        let name = self.registry.canonical_name(name)?;
        let input = DirectiveInput::from_json(name, value)?;
        self.append_directive(name, input)
    }

    /// Remove a directive from the policy
    pub fn remove_directive(&mut self, name: &str) -> PolicyResult<()> {
        let name = self.registry.canonical_name(name)?;
        self.remove(name);
        Ok(())
    }

    /// Append to a directive only if the policy already restricts it.
    ///
    /// If the directive is present the value is appended. Otherwise the nearest present
    /// directive in its fallback list is copied as a baseline and the value appended to
    /// the copy, so the new directive extends what the browser would have enforced. If
    /// neither the directive nor any fallback is present the policy is left to browser
    /// defaults and nothing changes.
    pub fn fallback_aware_append_if_enabled(
        &mut self,
        name: &str,
        value: impl Into<DirectiveInput>,
    ) -> PolicyResult<()> {
        let name = self.registry.canonical_name(name)?;
        if self.registry.directive_schema(name)? == SchemaKind::Boolean {
            return Err(PolicyError::invalid_value(name, "boolean directives can only be set"));
        }
        let tokens = value.into().into_tokens().ok_or_else(|| {
            PolicyError::invalid_value(name, "boolean value for a non-boolean directive")
        })?;

        if self.has_directive(name) {
            return self.append_directive(name, tokens);
        }

        for fallback in self.registry.directive_fallback_list(name)? {
            let mut merged = match self.position(fallback).map(|index| &self.directives[index].1) {
                Some(DirectiveValue::Tokens(existing)) => existing.clone(),
                Some(DirectiveValue::Flag(_)) | None => continue,
            };
            log::debug!("Copying {} into {} before appending", fallback, name);
            merged.extend(tokens);
            self.directives.push((name, DirectiveValue::Tokens(merged)));
            return Ok(());
        }

        log::debug!("Skipping append to {}: no directive or fallback is enabled", name);
        Ok(())
    }

    pub fn header_name(&self) -> &'static str {
        if self.report_only {
            REPORT_ONLY_HEADER_NAME
        } else {
            HEADER_NAME
        }
    }

    /// Serialize the directives into a header value.
    pub fn header_value(&self) -> String {
        let mut rendered: Vec<Rendered> = Vec::with_capacity(self.directives.len());

        for (name, value) in &self.directives {
            let schema = match self.registry.directive_schema(name) {
                Ok(schema) => schema,
                Err(_) => continue,
            };
            match value {
                DirectiveValue::Flag(true) => rendered.push(Rendered::Bare(*name)),
                DirectiveValue::Flag(false) => {}
                DirectiveValue::Tokens(tokens) if tokens.is_empty() => {
                    if schema == SchemaKind::OptionalTokenList {
                        rendered.push(Rendered::Bare(*name));
                    }
                }
                DirectiveValue::Tokens(tokens) => {
                    let tokens = if schema.is_source_list() {
                        reduce_source_list(tokens)
                    } else {
                        dedupe(tokens)
                    };
                    rendered.push(Rendered::Tokens(*name, tokens));
                }
            }
        }

        let mut output = Vec::with_capacity(rendered.len());
        for entry in &rendered {
            match entry {
                Rendered::Bare(name) => output.push(name.to_string()),
                Rendered::Tokens(name, tokens) => {
                    if self.is_redundant(name, tokens, &rendered) {
                        log::trace!("Omitting {}: identical to its nearest fallback", name);
                        continue;
                    }
                    output.push(format!("{} {}", name, tokens.join(" ")));
                }
            }
        }

        output.join("; ")
    }

    /// A directive is redundant when the nearest fallback with a value has the same
    /// reduced value. Fallbacks further along the chain are never consulted.
    fn is_redundant(&self, name: &str, tokens: &[String], rendered: &[Rendered]) -> bool {
        let fallbacks = self.registry.directive_fallback_list(name).unwrap_or(&[]);
        for fallback in fallbacks {
            let nearest = rendered.iter().find_map(|entry| match entry {
                Rendered::Tokens(other, other_tokens) if other == fallback => Some(other_tokens),
                _ => None,
            });
            if let Some(fallback_tokens) = nearest {
                return fallback_tokens.as_slice() == tokens;
            }
        }
        false
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.directives.iter().position(|(existing, _)| *existing == name)
    }

    /// Store a value, keeping the directive's original position if it was present.
    fn store(&mut self, name: &'static str, value: DirectiveValue) {
        match self.position(name) {
            Some(index) => self.directives[index].1 = value,
            None => self.directives.push((name, value)),
        }
    }

    fn remove(&mut self, name: &str) {
        self.directives.retain(|(existing, _)| *existing != name);
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.header_name(), self.header_value())
    }
}

/// A directive after reduction, before fallback suppression
enum Rendered {
    Bare(&'static str),
    Tokens(&'static str, Vec<String>),
}

fn dedupe(tokens: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if !unique.contains(token) {
            unique.push(token.clone());
        }
    }
    unique
}
