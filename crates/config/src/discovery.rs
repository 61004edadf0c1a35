use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Something that knows which hosts a page will load from, keyed by directive name.
pub trait SourceDiscovery {
    fn sources(&self) -> BTreeMap<String, Vec<String>>;
}

impl SourceDiscovery for BTreeMap<String, Vec<String>> {
    fn sources(&self) -> BTreeMap<String, Vec<String>> {
        self.clone()
    }
}

/// Host source for a URI.
///
/// The scheme is kept only for https so the source does not also allow plain http.
/// Protocol-relative URIs (`//cdn.example.com/lib.js`) are accepted. Default ports are
/// omitted.
pub fn host_from_uri(uri: &str) -> ConfigResult<String> {
    let absolute = if uri.starts_with("//") {
        Cow::Owned(format!("http:{}", uri))
    } else {
        Cow::Borrowed(uri)
    };

    let url = Url::parse(&absolute)?;
    let host = url.host_str().ok_or_else(|| ConfigError::InvalidUri {
        uri: uri.to_string(),
        reason: "no host".to_string(),
    })?;

    let mut source = if url.scheme() == "https" {
        format!("https://{}", host)
    } else {
        host.to_string()
    };
    if let Some(port) = url.port() {
        source.push_str(&format!(":{}", port));
    }
    Ok(source)
}

/// Where a library asset is served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    External(String),
    Local(String),
}

/// A front-end library and the assets it loads
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LibraryDefinition {
    pub name: String,
    pub scripts: Vec<AssetLocation>,
    pub styles: Vec<AssetLocation>,
}

impl LibraryDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn script(mut self, location: AssetLocation) -> Self {
        self.scripts.push(location);
        self
    }

    pub fn style(mut self, location: AssetLocation) -> Self {
        self.styles.push(location);
        self
    }
}

/// Collects the external hosts of registered libraries.
#[derive(Debug, Clone, Default)]
pub struct LibraryPolicyBuilder {
    libraries: Vec<LibraryDefinition>,
}

impl LibraryPolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_library(&mut self, library: LibraryDefinition) -> &mut Self {
        self.libraries.push(library);
        self
    }

    pub fn libraries(&self) -> &[LibraryDefinition] {
        &self.libraries
    }

    /// Hosts of one library's external assets, keyed by directive.
    pub fn library_sources(&self, name: &str) -> BTreeMap<String, Vec<String>> {
        let mut sources = BTreeMap::new();
        for library in self.libraries.iter().filter(|library| library.name == name) {
            collect_library(library, &mut sources);
        }
        finish(sources)
    }
}

impl SourceDiscovery for LibraryPolicyBuilder {
    fn sources(&self) -> BTreeMap<String, Vec<String>> {
        let mut sources = BTreeMap::new();
        for library in &self.libraries {
            collect_library(library, &mut sources);
        }
        finish(sources)
    }
}

fn collect_library(library: &LibraryDefinition, sources: &mut BTreeMap<String, BTreeSet<String>>) {
    for (directive, assets) in [("script-src", &library.scripts), ("style-src", &library.styles)] {
        for asset in assets {
            let uri = match asset {
                AssetLocation::External(uri) => uri,
                AssetLocation::Local(_) => continue,
            };
            match host_from_uri(uri) {
                Ok(host) => {
                    sources.entry(directive.to_string()).or_default().insert(host);
                }
                Err(e) => log::debug!("Skipping asset {} of library {}: {}", uri, library.name, e),
            }
        }
    }
}

fn finish(sources: BTreeMap<String, BTreeSet<String>>) -> BTreeMap<String, Vec<String>> {
    sources
        .into_iter()
        .map(|(directive, hosts)| (directive, hosts.into_iter().collect()))
        .collect()
}

lazy_static! {
    static ref MARKUP_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("script-src", Regex::new(r#"<script[^>]+src=["']([^"']+)["']"#).unwrap()),
        (
            "style-src",
            Regex::new(r#"<link[^>]+rel=["']stylesheet["'][^>]+href=["']([^"']+)["']"#).unwrap(),
        ),
        (
            "style-src",
            Regex::new(r#"<link[^>]+href=["']([^"']+)["'][^>]+rel=["']stylesheet["']"#).unwrap(),
        ),
        ("img-src", Regex::new(r#"<img[^>]+src=["']([^"']+)["']"#).unwrap()),
        (
            "font-src",
            Regex::new(concat!(
                r#"<link[^>]+rel=["']preload["'][^>]+as=["']font["']"#,
                r#"[^>]+href=["']([^"']+)["']"#
            ))
            .unwrap(),
        ),
        ("frame-src", Regex::new(r#"<iframe[^>]+src=["']([^"']+)["']"#).unwrap()),
        ("media-src", Regex::new(r#"<(?:audio|video|source)[^>]+src=["']([^"']+)["']"#).unwrap()),
    ];
}

/// Cross-origin hosts referenced by a rendered page.
///
/// Same-origin references are covered by `'self'` and contribute nothing. Only http(s)
/// references are considered.
#[derive(Debug, Clone)]
pub struct MarkupSourceDiscovery {
    base_url: Url,
    markup: String,
}

impl MarkupSourceDiscovery {
    pub fn new(base_url: Url, markup: impl Into<String>) -> Self {
        Self {
            base_url,
            markup: markup.into(),
        }
    }

    fn resolve(&self, reference: &str) -> Option<Url> {
        let url = match self.base_url.join(reference) {
            Ok(url) => url,
            Err(e) => {
                log::debug!("Ignoring unresolvable reference {}: {}", reference, e);
                return None;
            }
        };
        if !matches!(url.scheme(), "http" | "https") || url.origin() == self.base_url.origin() {
            return None;
        }
        Some(url)
    }
}

impl SourceDiscovery for MarkupSourceDiscovery {
    fn sources(&self) -> BTreeMap<String, Vec<String>> {
        let mut sources: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (directive, pattern) in MARKUP_PATTERNS.iter() {
            for captures in pattern.captures_iter(&self.markup) {
                let url = match captures.get(1).and_then(|m| self.resolve(m.as_str())) {
                    Some(url) => url,
                    None => continue,
                };
                match host_from_uri(url.as_str()) {
                    Ok(host) => {
                        log::trace!("Discovered {} source {}", directive, host);
                        sources.entry(directive.to_string()).or_default().insert(host);
                    }
                    Err(e) => log::debug!("Skipping {}: {}", url, e),
                }
            }
        }
        finish(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_host_from_uri() {
        assert_eq!(
            host_from_uri("https://cdn.example.com/lib.js").unwrap(),
            "https://cdn.example.com"
        );
        assert_eq!(host_from_uri("http://cdn.example.com/lib.js").unwrap(), "cdn.example.com");
        assert_eq!(host_from_uri("//cdn.example.com/lib.js").unwrap(), "cdn.example.com");
        assert_eq!(
            host_from_uri("https://cdn.example.com:8443/lib.js").unwrap(),
            "https://cdn.example.com:8443"
        );
        assert_eq!(
            host_from_uri("https://cdn.example.com:443/lib.js").unwrap(),
            "https://cdn.example.com"
        );
        assert_eq!(host_from_uri("http://127.0.0.1:8080/").unwrap(), "127.0.0.1:8080");
    }

    #[test]
    fn test_host_from_uri_errors() {
        assert!(matches!(host_from_uri("/js/app.js"), Err(ConfigError::Url(_))));
        assert!(matches!(
            host_from_uri("data:text/javascript,alert(1)"),
            Err(ConfigError::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_library_sources() {
        let external = |uri: &str| AssetLocation::External(uri.to_string());
        let mut builder = LibraryPolicyBuilder::new();
        builder
            .add_library(
                LibraryDefinition::new("maps")
                    .script(external("https://maps.example.com/api.js"))
                    .script(external("//static.example.net/maps.js"))
                    .style(external("https://maps.example.com/maps.css"))
                    .script(AssetLocation::Local("js/maps-init.js".to_string())),
            )
            .add_library(
                LibraryDefinition::new("analytics")
                    .script(external("https://maps.example.com/collect.js"))
                    .script(external("not a uri")),
            );

        let sources = builder.sources();
        assert_eq!(
            sources["script-src"],
            vec!["https://maps.example.com", "static.example.net"]
        );
        assert_eq!(sources["style-src"], vec!["https://maps.example.com"]);

        let analytics = builder.library_sources("analytics");
        assert_eq!(analytics["script-src"], vec!["https://maps.example.com"]);
        assert!(!analytics.contains_key("style-src"));
    }

    #[test]
    fn test_local_only_library_contributes_nothing() {
        let mut builder = LibraryPolicyBuilder::new();
        builder.add_library(
            LibraryDefinition::new("local").script(AssetLocation::Local("a.js".to_string())),
        );
        assert!(builder.sources().is_empty());
    }

    #[test]
    fn test_markup_discovery() {
        let html = r#"
            <html>
            <head>
                <link rel="stylesheet" href="/css/site.css">
                <link href="https://fonts.example.net/css" rel="stylesheet">
                <script src="https://cdn.example.com/app.js"></script>
                <script src="/js/local.js"></script>
            </head>
            <body>
                <img src="http://images.example.org:8080/logo.png" alt="logo">
                <img src="data:image/png;base64,AAAA">
                <iframe src="https://www.example.com/embed"></iframe>
            </body>
            </html>
        "#;
        let base_url = Url::parse("https://www.example.com/page").unwrap();
        let discovery = MarkupSourceDiscovery::new(base_url, html);
        let sources = discovery.sources();

        assert_eq!(sources["script-src"], vec!["https://cdn.example.com"]);
        assert_eq!(sources["style-src"], vec!["https://fonts.example.net"]);
        assert_eq!(sources["img-src"], vec!["images.example.org:8080"]);
        assert!(!sources.contains_key("frame-src"));
    }
}
