//! Syntax checks for values entered into settings.

use lazy_static::lazy_static;
use regex::Regex;

/// Keyword flags a source list setting may enable, unquoted.
pub const SOURCE_FLAGS: &[&str] = &[
    "unsafe-inline",
    "unsafe-eval",
    "unsafe-hashes",
    "unsafe-allow-redirects",
    "strict-dynamic",
    "report-sample",
];

lazy_static! {
    // Scheme optional and limited to http(s)/ws(s). Domains need at least two labels;
    // query strings are not allowed.
    static ref HOST_SOURCE: Regex = Regex::new(concat!(
        r"(?i)^(?:(?:https?|wss?)://)?",
        r"(?:",
        r"(?:\*\.)?(?:(?:[a-z0-9\-.]|%[0-9a-f]{2})+\.)+(?:[a-z0-9\-.]|%[0-9a-f]{2})+",
        r"|\[(?:[0-9a-f]{0,4}:)*[0-9a-f]{0,4}\]",
        r"|localhost",
        r")",
        r"(?::[0-9]+)?",
        r"(?:[/|?](?:[\w#!:.+=&@$'~*,;/()\[\]\-]|%[0-9a-f]{2})*)?$",
    ))
    .unwrap();
    static ref SCHEME_SOURCE: Regex = Regex::new(r"^([a-z]+:)?$").unwrap();
    static ref MEDIA_TYPE: Regex = Regex::new(r"^[\w-]+/[\w-]+$").unwrap();
}

/// Verify the syntax of a host source.
pub fn is_valid_host(source: &str) -> bool {
    HOST_SOURCE.is_match(source)
}

/// A bare scheme such as `data:`.
pub fn is_valid_scheme_source(source: &str) -> bool {
    SCHEME_SOURCE.is_match(source)
}

pub fn is_valid_media_type(media_type: &str) -> bool {
    MEDIA_TYPE.is_match(media_type)
}

pub fn is_valid_flag(flag: &str) -> bool {
    SOURCE_FLAGS.contains(&flag)
}

/// Split free text the way settings forms accept it: whitespace or commas.
pub fn split_source_text(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
