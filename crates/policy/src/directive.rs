//! The directive registry.
//!
//! Holds the fixed set of directive names a policy may contain, the value grammar each
//! one accepts, and the fallback chain browsers walk when a directive is absent.
//! The table never changes at runtime and is shared read-only by every policy.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use crate::error::{PolicyError, PolicyResult};

/// Value grammar of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    /// https://www.w3.org/TR/CSP/#grammardef-serialized-source-list
    SourceList,
    /// https://www.w3.org/TR/CSP/#grammardef-ancestor-source-list
    AncestorSourceList,
    /// https://www.w3.org/TR/CSP/#grammardef-media-type-list
    MediaTypeList,
    TokenList,
    /// A token list that is meaningful when empty (`sandbox`)
    OptionalTokenList,
    Token,
    UriReferenceList,
    Boolean,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::SourceList => "source-list",
            SchemaKind::AncestorSourceList => "ancestor-source-list",
            SchemaKind::MediaTypeList => "media-type-list",
            SchemaKind::TokenList => "token-list",
            SchemaKind::OptionalTokenList => "optional-token-list",
            SchemaKind::Token => "token",
            SchemaKind::UriReferenceList => "uri-reference-list",
            SchemaKind::Boolean => "boolean",
        }
    }

    /// Whether values of this kind go through source list reduction.
    pub fn is_source_list(&self) -> bool {
        matches!(self, SchemaKind::SourceList | SchemaKind::AncestorSourceList)
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directives and their grammar, in declaration order.
const DIRECTIVES: &[(&str, SchemaKind)] = &[
    // Fetch directives
    ("default-src", SchemaKind::SourceList),
    ("child-src", SchemaKind::SourceList),
    ("connect-src", SchemaKind::SourceList),
    ("font-src", SchemaKind::SourceList),
    ("frame-src", SchemaKind::SourceList),
    ("img-src", SchemaKind::SourceList),
    ("manifest-src", SchemaKind::SourceList),
    ("media-src", SchemaKind::SourceList),
    ("object-src", SchemaKind::SourceList),
    ("prefetch-src", SchemaKind::SourceList),
    ("script-src", SchemaKind::SourceList),
    ("script-src-attr", SchemaKind::SourceList),
    ("script-src-elem", SchemaKind::SourceList),
    ("style-src", SchemaKind::SourceList),
    ("style-src-attr", SchemaKind::SourceList),
    ("style-src-elem", SchemaKind::SourceList),
    ("worker-src", SchemaKind::SourceList),
    // Document directives
    ("base-uri", SchemaKind::SourceList),
    ("plugin-types", SchemaKind::MediaTypeList),
    ("sandbox", SchemaKind::OptionalTokenList),
    // Navigation directives
    ("form-action", SchemaKind::SourceList),
    ("frame-ancestors", SchemaKind::AncestorSourceList),
    ("navigate-to", SchemaKind::SourceList),
    // Reporting directives
    ("report-uri", SchemaKind::UriReferenceList),
    ("report-to", SchemaKind::Token),
    // Other directives
    ("block-all-mixed-content", SchemaKind::Boolean),
    ("upgrade-insecure-requests", SchemaKind::Boolean),
    // `'allow'` or `'block'`
    ("webrtc", SchemaKind::Token),
    // Deprecated, still accepted by older browsers
    ("referrer", SchemaKind::Token),
    ("require-sri-for", SchemaKind::TokenList),
];

/// https://www.w3.org/TR/CSP/#directive-fallback-list
const FALLBACKS: &[(&str, &[&str])] = &[
    ("script-src-elem", &["script-src", "default-src"]),
    ("script-src-attr", &["script-src", "default-src"]),
    ("script-src", &["default-src"]),
    ("style-src-elem", &["style-src", "default-src"]),
    ("style-src-attr", &["style-src", "default-src"]),
    ("style-src", &["default-src"]),
    ("worker-src", &["child-src", "script-src", "default-src"]),
    ("child-src", &["script-src", "default-src"]),
    ("connect-src", &["default-src"]),
    ("manifest-src", &["default-src"]),
    ("prefetch-src", &["default-src"]),
    ("object-src", &["default-src"]),
    ("frame-src", &["child-src", "default-src"]),
    ("media-src", &["default-src"]),
    ("font-src", &["default-src"]),
    ("img-src", &["default-src"]),
];

lazy_static! {
    static ref STANDARD: DirectiveRegistry = DirectiveRegistry::from_tables(DIRECTIVES, FALLBACKS);
}

/// Read-only table of valid directives.
#[derive(Debug)]
pub struct DirectiveRegistry {
    names: Vec<&'static str>,
    schemas: HashMap<&'static str, SchemaKind>,
    fallbacks: HashMap<&'static str, &'static [&'static str]>,
}

impl DirectiveRegistry {
    /// The CSP Level 3 registry, initialized once per process.
    pub fn standard() -> &'static DirectiveRegistry {
        &*STANDARD
    }

    fn from_tables(
        directives: &'static [(&'static str, SchemaKind)],
        fallbacks: &'static [(&'static str, &'static [&'static str])],
    ) -> Self {
        Self {
            names: directives.iter().map(|(name, _)| *name).collect(),
            schemas: directives.iter().copied().collect(),
            fallbacks: fallbacks.iter().copied().collect(),
        }
    }

    pub fn is_valid_directive_name(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Resolve a caller-supplied name to the registry's own `'static` copy.
    pub(crate) fn canonical_name(&self, name: &str) -> PolicyResult<&'static str> {
        self.schemas
            .get_key_value(name)
            .map(|(key, _)| *key)
            .ok_or_else(|| PolicyError::InvalidDirective(name.to_string()))
    }

    pub fn directive_schema(&self, name: &str) -> PolicyResult<SchemaKind> {
        self.schemas
            .get(name)
            .copied()
            .ok_or_else(|| PolicyError::InvalidDirective(name.to_string()))
    }

    /// All directive names in declaration order.
    pub fn directive_names(&self) -> &[&'static str] {
        &self.names
    }

    /// Nearest-first fallback chain for a directive; empty if it has none.
    pub fn directive_fallback_list(&self, name: &str) -> PolicyResult<&'static [&'static str]> {
        let name = self.canonical_name(name)?;
        Ok(self.fallbacks.get(name).copied().unwrap_or(&[]))
    }
}
