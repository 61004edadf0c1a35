use std::collections::BTreeMap;
use std::fmt;

use palisade_policy::{
    DirectiveInput, DirectiveRegistry, Policy, PolicyError, SchemaKind, POLICY_ANY, POLICY_NONE,
    POLICY_SELF,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::reporting::ReportingHandler;
use crate::validation::{is_valid_flag, is_valid_host, is_valid_media_type, is_valid_scheme_source};

/// Directives browsers ignore in a report-only policy.
pub const ENFORCE_ONLY_DIRECTIVES: &[&str] = &["upgrade-insecure-requests", "sandbox"];

/// Keywords accepted by `webrtc`, written without quotes.
pub const WEBRTC_VALUES: &[&str] = &["allow", "block"];

/// Which header a set of settings feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyType {
    ReportOnly,
    Enforce,
}

impl PolicyType {
    /// Report-only is emitted first.
    pub const ALL: [PolicyType; 2] = [PolicyType::ReportOnly, PolicyType::Enforce];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::ReportOnly => "report-only",
            PolicyType::Enforce => "enforce",
        }
    }

    pub fn is_report_only(&self) -> bool {
        matches!(self, PolicyType::ReportOnly)
    }

    /// An empty policy of this type.
    pub fn new_policy(&self) -> Policy {
        let mut policy = Policy::new();
        policy.report_only(self.is_report_only());
        policy
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword a source list setting starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceBase {
    #[serde(rename = "self")]
    SelfOrigin,
    #[serde(rename = "none")]
    None,
    #[serde(rename = "any")]
    Any,
    #[default]
    #[serde(rename = "")]
    Empty,
}

impl SourceBase {
    pub fn source_expression(&self) -> Option<&'static str> {
        match self {
            SourceBase::SelfOrigin => Some(POLICY_SELF),
            SourceBase::None => Some(POLICY_NONE),
            SourceBase::Any => Some(POLICY_ANY),
            SourceBase::Empty => None,
        }
    }
}

/// Structured form of a source list directive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceListSetting {
    pub base: SourceBase,
    /// Keywords such as `unsafe-inline`, written without quotes
    pub flags: Vec<String>,
    /// Hosts and bare schemes
    pub sources: Vec<String>,
}

impl SourceListSetting {
    /// Tokens appended after the base: quoted flags, then sources.
    fn tokens(&self) -> Vec<String> {
        self.flags
            .iter()
            .filter(|flag| !flag.is_empty())
            .map(|flag| format!("'{}'", flag))
            .chain(self.sources.iter().filter(|source| !source.is_empty()).cloned())
            .collect()
    }
}

/// Setting for one directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirectiveSetting {
    Flag(bool),
    /// Single token; empty leaves the directive unset
    Text(String),
    List(Vec<String>),
    Sources(SourceListSetting),
}

/// Settings for one policy header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub enable: bool,
    pub directives: BTreeMap<String, DirectiveSetting>,
}

impl PolicySettings {
    pub fn enabled() -> Self {
        Self {
            enable: true,
            ..Self::default()
        }
    }

    /// Builder-style helper used mostly by tests and programmatic setup.
    pub fn with_directive(mut self, name: &str, setting: DirectiveSetting) -> Self {
        self.directives.insert(name.to_string(), setting);
        self
    }

    /// Check every directive setting against its grammar.
    pub fn validate(&self) -> ConfigResult<()> {
        let registry = DirectiveRegistry::standard();

        for (name, setting) in &self.directives {
            let schema = registry.directive_schema(name)?;
            validate_directive(name, schema, setting)?;
        }
        Ok(())
    }

    /// Write the settings into `policy`, in registry declaration order.
    pub fn apply(&self, policy: &mut Policy) -> ConfigResult<()> {
        let registry = policy.registry();

        if let Some(unknown) = self
            .directives
            .keys()
            .find(|name| !registry.is_valid_directive_name(name))
        {
            return Err(PolicyError::InvalidDirective(unknown.clone()).into());
        }

        for name in registry.directive_names() {
            let setting = match self.directives.get(*name) {
                Some(setting) => setting,
                None => continue,
            };

            if policy.is_report_only() && ENFORCE_ONLY_DIRECTIVES.contains(name) {
                log::warn!("Ignoring {} in report-only policy", name);
                continue;
            }

            let schema = registry.directive_schema(name)?;
            apply_directive(policy, name, schema, setting)?;
        }
        Ok(())
    }
}

fn apply_directive(
    policy: &mut Policy,
    name: &str,
    schema: SchemaKind,
    setting: &DirectiveSetting,
) -> ConfigResult<()> {
    match setting {
        DirectiveSetting::Flag(enabled) => {
            if *enabled {
                policy.set_directive(name, true)?;
            }
        }
        DirectiveSetting::Text(value) if value.is_empty() => {}
        DirectiveSetting::Text(value) if name == "webrtc" => {
            policy.set_directive(name, format!("'{}'", value))?;
        }
        DirectiveSetting::Text(value) => {
            policy.set_directive(name, value.as_str())?;
        }
        DirectiveSetting::List(values)
            if values.is_empty() && schema == SchemaKind::OptionalTokenList =>
        {
            // bare directive, e.g. `sandbox`
            policy.append_directive(name, DirectiveInput::empty())?;
        }
        DirectiveSetting::List(values) => {
            policy.set_directive(name, values.as_slice())?;
        }
        DirectiveSetting::Sources(sources) => {
            if let Some(base) = sources.base.source_expression() {
                policy.set_directive(name, base)?;
            }
            policy.append_directive(name, sources.tokens())?;
        }
    }
    log::trace!("Applied setting for {}", name);
    Ok(())
}

fn validate_directive(
    name: &str,
    schema: SchemaKind,
    setting: &DirectiveSetting,
) -> ConfigResult<()> {
    match setting {
        DirectiveSetting::Flag(_) if schema != SchemaKind::Boolean => {
            Err(mismatch(name, schema, "a boolean"))
        }
        DirectiveSetting::Flag(_) => Ok(()),
        DirectiveSetting::Text(_) if schema != SchemaKind::Token => {
            Err(mismatch(name, schema, "a single value"))
        }
        DirectiveSetting::Text(value)
            if name == "webrtc" && !value.is_empty() && !WEBRTC_VALUES.contains(&value.as_str()) =>
        {
            Err(PolicyError::InvalidValue {
                directive: name.to_string(),
                reason: format!("expected allow or block, found {:?}", value),
            }
            .into())
        }
        DirectiveSetting::Text(_) => Ok(()),
        DirectiveSetting::List(_) if schema == SchemaKind::Boolean => {
            Err(mismatch(name, schema, "a list"))
        }
        DirectiveSetting::List(values) if schema == SchemaKind::MediaTypeList => {
            match values.iter().find(|value| !is_valid_media_type(value)) {
                Some(invalid) => Err(ConfigError::InvalidMediaType {
                    directive: name.to_string(),
                    media_type: invalid.clone(),
                }),
                None => Ok(()),
            }
        }
        DirectiveSetting::List(_) => Ok(()),
        DirectiveSetting::Sources(_) if !schema.is_source_list() => {
            Err(mismatch(name, schema, "a source list"))
        }
        DirectiveSetting::Sources(sources) => {
            if let Some(flag) = sources.flags.iter().find(|flag| !is_valid_flag(flag)) {
                return Err(ConfigError::InvalidFlag {
                    directive: name.to_string(),
                    flag: flag.clone(),
                });
            }
            // frame-ancestors takes no script or style keywords
            if schema == SchemaKind::AncestorSourceList && !sources.flags.is_empty() {
                return Err(ConfigError::InvalidFlag {
                    directive: name.to_string(),
                    flag: sources.flags[0].clone(),
                });
            }
            match sources
                .sources
                .iter()
                .find(|source| !is_valid_host(source) && !is_valid_scheme_source(source))
            {
                Some(invalid) => Err(ConfigError::InvalidSource {
                    directive: name.to_string(),
                    source_expression: invalid.clone(),
                }),
                None => Ok(()),
            }
        }
    }
}

fn mismatch(name: &str, schema: SchemaKind, found: &str) -> ConfigError {
    PolicyError::InvalidValue {
        directive: name.to_string(),
        reason: format!("{} directive cannot be configured with {}", schema, found),
    }
    .into()
}

/// The complete settings document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CspSettings {
    #[serde(rename = "report-only")]
    pub report_only: PolicySettings,
    pub enforce: PolicySettings,
    pub report: ReportingHandler,
}

impl CspSettings {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> ConfigResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn policy(&self, policy_type: PolicyType) -> &PolicySettings {
        match policy_type {
            PolicyType::ReportOnly => &self.report_only,
            PolicyType::Enforce => &self.enforce,
        }
    }

    pub fn policy_mut(&mut self, policy_type: PolicyType) -> &mut PolicySettings {
        match policy_type {
            PolicyType::ReportOnly => &mut self.report_only,
            PolicyType::Enforce => &mut self.enforce,
        }
    }

    /// Validate both policies and the reporting handler.
    pub fn validate(&self) -> ConfigResult<()> {
        for policy_type in PolicyType::ALL {
            self.policy(policy_type).validate()?;
        }
        self.report.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sources(base: SourceBase, flags: &[&str], sources: &[&str]) -> DirectiveSetting {
        DirectiveSetting::Sources(SourceListSetting {
            base,
            flags: flags.iter().map(|s| s.to_string()).collect(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn test_deserialize_directive_settings() {
        let settings: PolicySettings = serde_json::from_value(json!({
            "enable": true,
            "directives": {
                "upgrade-insecure-requests": true,
                "sandbox": [],
                "script-src": {"base": "self", "flags": ["unsafe-inline"]},
                "object-src": {"base": "none"}
            }
        }))
        .unwrap();

        assert!(settings.enable);
        assert_eq!(
            settings.directives["upgrade-insecure-requests"],
            DirectiveSetting::Flag(true)
        );
        assert_eq!(settings.directives["sandbox"], DirectiveSetting::List(vec![]));
        assert_eq!(
            settings.directives["script-src"],
            sources(SourceBase::SelfOrigin, &["unsafe-inline"], &[])
        );
        assert_eq!(settings.directives["object-src"], sources(SourceBase::None, &[], &[]));
    }

    #[test]
    fn test_apply_in_registry_order() {
        let settings = PolicySettings::enabled()
            .with_directive(
                "script-src",
                sources(SourceBase::SelfOrigin, &["unsafe-inline"], &["cdn.example.com"]),
            )
            .with_directive("default-src", sources(SourceBase::SelfOrigin, &[], &[]))
            .with_directive("upgrade-insecure-requests", DirectiveSetting::Flag(true));

        let mut policy = Policy::new();
        settings.apply(&mut policy).unwrap();

        assert_eq!(
            policy.header_value(),
            concat!(
                "default-src 'self'; ",
                "script-src 'self' 'unsafe-inline' cdn.example.com; ",
                "upgrade-insecure-requests"
            )
        );
    }

    #[test]
    fn test_apply_skips_false_flags_and_empty_base() {
        let settings = PolicySettings::enabled()
            .with_directive("upgrade-insecure-requests", DirectiveSetting::Flag(false))
            .with_directive("img-src", sources(SourceBase::Empty, &[], &[]));

        let mut policy = Policy::new();
        settings.apply(&mut policy).unwrap();
        assert_eq!(policy.header_value(), "");
    }

    #[test]
    fn test_bare_sandbox() {
        let settings =
            PolicySettings::enabled().with_directive("sandbox", DirectiveSetting::List(vec![]));

        let mut policy = Policy::new();
        settings.apply(&mut policy).unwrap();
        assert_eq!(policy.header_value(), "sandbox");
    }

    #[test]
    fn test_webrtc_setting() {
        let settings: PolicySettings = serde_json::from_value(json!({
            "enable": true,
            "directives": {"webrtc": "block", "report-to": "csp-endpoint"}
        }))
        .unwrap();
        assert_eq!(
            settings.directives["webrtc"],
            DirectiveSetting::Text("block".to_string())
        );
        settings.validate().unwrap();

        let mut policy = Policy::new();
        settings.apply(&mut policy).unwrap();
        assert_eq!(policy.header_value(), "report-to csp-endpoint; webrtc 'block'");

        let empty = PolicySettings::enabled()
            .with_directive("webrtc", DirectiveSetting::Text(String::new()));
        empty.validate().unwrap();
        let mut policy = Policy::new();
        empty.apply(&mut policy).unwrap();
        assert_eq!(policy.header_value(), "");
    }

    #[test]
    fn test_validate_webrtc_values() {
        let invalid = PolicySettings::enabled()
            .with_directive("webrtc", DirectiveSetting::Text("maybe".to_string()));
        assert!(matches!(
            invalid.validate().unwrap_err(),
            ConfigError::Policy(PolicyError::InvalidValue { directive, .. })
                if directive == "webrtc"
        ));

        let text_on_source_list = PolicySettings::enabled()
            .with_directive("script-src", DirectiveSetting::Text("'self'".to_string()));
        assert!(text_on_source_list.validate().unwrap_err().is_validation_error());
    }

    #[test]
    fn test_enforce_only_directives_skipped_in_report_only() {
        let settings = PolicySettings::enabled()
            .with_directive("default-src", sources(SourceBase::SelfOrigin, &[], &[]))
            .with_directive("upgrade-insecure-requests", DirectiveSetting::Flag(true))
            .with_directive("sandbox", DirectiveSetting::List(vec!["allow-forms".to_string()]));

        let mut policy = PolicyType::ReportOnly.new_policy();
        settings.apply(&mut policy).unwrap();
        assert_eq!(policy.header_value(), "default-src 'self'");
    }

    #[test]
    fn test_apply_rejects_unknown_directive() {
        let settings =
            PolicySettings::enabled().with_directive("script", DirectiveSetting::Flag(true));
        let mut policy = Policy::new();

        let err = settings.apply(&mut policy).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Policy(PolicyError::InvalidDirective(name)) if name == "script"
        ));
    }

    #[test]
    fn test_validate_sources() {
        let valid = PolicySettings::enabled().with_directive(
            "script-src",
            sources(
                SourceBase::SelfOrigin,
                &["strict-dynamic"],
                &["https://cdn.example.com", "data:"],
            ),
        );
        assert!(valid.validate().is_ok());

        let invalid = PolicySettings::enabled().with_directive(
            "script-src",
            sources(SourceBase::SelfOrigin, &[], &["example.com/?q=1"]),
        );
        assert!(matches!(
            invalid.validate().unwrap_err(),
            ConfigError::InvalidSource { directive, .. } if directive == "script-src"
        ));
    }

    #[test]
    fn test_validate_flags() {
        let invalid_flag = PolicySettings::enabled()
            .with_directive("style-src", sources(SourceBase::SelfOrigin, &["unsafe-all"], &[]));
        assert!(matches!(invalid_flag.validate().unwrap_err(), ConfigError::InvalidFlag { .. }));

        let ancestor_flag = PolicySettings::enabled().with_directive(
            "frame-ancestors",
            sources(SourceBase::SelfOrigin, &["unsafe-inline"], &[]),
        );
        assert!(matches!(ancestor_flag.validate().unwrap_err(), ConfigError::InvalidFlag { .. }));
    }

    #[test]
    fn test_validate_media_types() {
        let settings = PolicySettings::enabled().with_directive(
            "plugin-types",
            DirectiveSetting::List(vec!["application/pdf".to_string(), "pdf".to_string()]),
        );
        assert!(matches!(
            settings.validate().unwrap_err(),
            ConfigError::InvalidMediaType { media_type, .. } if media_type == "pdf"
        ));
    }

    #[test]
    fn test_validate_schema_mismatch() {
        let settings =
            PolicySettings::enabled().with_directive("script-src", DirectiveSetting::Flag(true));
        assert!(settings.validate().unwrap_err().is_validation_error());

        let settings = PolicySettings::enabled()
            .with_directive("upgrade-insecure-requests", DirectiveSetting::List(vec![]));
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_document_defaults() {
        let settings = CspSettings::from_json_str("{}").unwrap();
        assert_eq!(settings, CspSettings::default());
        assert!(!settings.report_only.enable);
        assert!(!settings.enforce.enable);
        assert_eq!(settings.report, ReportingHandler::None);
    }

    #[test]
    fn test_document_parse_error() {
        assert!(matches!(
            CspSettings::from_json_str("{\"enforce\": 1}").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }
}
