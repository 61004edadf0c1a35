//! Source list keywords and minimization.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

pub const POLICY_ANY: &str = "*";
pub const POLICY_NONE: &str = "'none'";
pub const POLICY_SELF: &str = "'self'";
pub const POLICY_STRICT_DYNAMIC: &str = "'strict-dynamic'";
pub const POLICY_UNSAFE_EVAL: &str = "'unsafe-eval'";
pub const POLICY_UNSAFE_INLINE: &str = "'unsafe-inline'";
pub const POLICY_UNSAFE_HASHES: &str = "'unsafe-hashes'";

/// Schemes whose hosts are all matched by `*`.
const NETWORK_SCHEMES: &[&str] = &["http", "https", "ws", "wss", "ftp"];

lazy_static! {
    static ref SCHEME_SOURCE: Regex = Regex::new(r"^([a-z][a-z0-9+.\-]*):$").unwrap();
    static ref NETWORK_SCHEME_SOURCE: Regex = Regex::new(r"^(https?|wss?|ftp):$").unwrap();
}

/// Reduce a list of sources to a minimal equivalent set.
///
/// Duplicates are dropped keeping the first occurrence. `'none'` overrides every other
/// source. A global wildcard absorbs network-scheme sources, keeping only keywords and
/// non-network schemes (`* https: data: example.com` -> `* data:`). A bare network
/// scheme absorbs hosts using that scheme (`http: example.com https://example.com` ->
/// `http: example.com`).
pub fn reduce_source_list<S: AsRef<str>>(sources: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reduced: Vec<String> = sources
        .iter()
        .map(AsRef::as_ref)
        .filter(|source| seen.insert(*source))
        .map(str::to_string)
        .collect();

    if reduced.iter().any(|source| source == POLICY_NONE) {
        return vec![POLICY_NONE.to_string()];
    }

    if reduced.iter().any(|source| source == POLICY_ANY) {
        reduced.retain(|source| source.starts_with('\'') || is_non_network_scheme(source));
        reduced.insert(0, POLICY_ANY.to_string());
    }

    let mut protocols: Vec<&str> = reduced
        .iter()
        .filter(|source| NETWORK_SCHEME_SOURCE.is_match(source))
        .map(String::as_str)
        .collect();
    if protocols.is_empty() {
        return reduced;
    }
    if protocols.contains(&"http:") {
        protocols.push("https:");
    }
    if protocols.contains(&"ws:") {
        protocols.push("wss:");
    }
    let prefixes: Vec<String> = protocols
        .iter()
        .map(|protocol| format!("{}//", protocol))
        .collect();

    reduced
        .iter()
        .filter(|source| !prefixes.iter().any(|prefix| source.starts_with(prefix.as_str())))
        .cloned()
        .collect()
}

/// A scheme-only source (`data:`) for a scheme a wildcard does not cover.
fn is_non_network_scheme(source: &str) -> bool {
    SCHEME_SOURCE
        .captures(source)
        .and_then(|captures| captures.get(1))
        .map(|scheme| !NETWORK_SCHEMES.contains(&scheme.as_str()))
        .unwrap_or(false)
}
