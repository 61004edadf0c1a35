use palisade_policy::Policy;

use crate::discovery::SourceDiscovery;
use crate::error::ConfigResult;
use crate::settings::{CspSettings, PolicyType};

/// A last chance to modify a policy before it is serialized.
pub trait PolicyAlter {
    fn alter(&self, policy: &mut Policy) -> ConfigResult<()>;
}

impl<F> PolicyAlter for F
where
    F: Fn(&mut Policy) -> ConfigResult<()>,
{
    fn alter(&self, policy: &mut Policy) -> ConfigResult<()> {
        self(policy)
    }
}

/// Turns settings into the policies to send with a response.
///
/// For each enabled policy type the settings are applied, discovered sources are appended
/// where the policy already restricts that directive, the reporting handler runs, and
/// finally any registered alters.
pub struct PolicyBuilder {
    settings: CspSettings,
    discovery: Vec<Box<dyn SourceDiscovery>>,
    alters: Vec<Box<dyn PolicyAlter>>,
}

impl PolicyBuilder {
    pub fn new(settings: CspSettings) -> Self {
        Self {
            settings,
            discovery: Vec::new(),
            alters: Vec::new(),
        }
    }

    pub fn settings(&self) -> &CspSettings {
        &self.settings
    }

    pub fn with_discovery(mut self, discovery: impl SourceDiscovery + 'static) -> Self {
        self.discovery.push(Box::new(discovery));
        self
    }

    pub fn with_alter(mut self, alter: impl PolicyAlter + 'static) -> Self {
        self.alters.push(Box::new(alter));
        self
    }

    /// Build one policy per enabled type, report-only first.
    pub fn build(&self) -> ConfigResult<Vec<Policy>> {
        let mut policies = Vec::new();

        for policy_type in PolicyType::ALL {
            let settings = self.settings.policy(policy_type);
            if !settings.enable {
                log::trace!("{} policy disabled", policy_type);
                continue;
            }
            policies.push(self.build_policy(policy_type)?);
        }
        Ok(policies)
    }

    /// Build a single policy regardless of whether its type is enabled.
    pub fn build_policy(&self, policy_type: PolicyType) -> ConfigResult<Policy> {
        let mut policy = policy_type.new_policy();
        self.settings.policy(policy_type).apply(&mut policy)?;

        for discovery in &self.discovery {
            for (directive, sources) in discovery.sources() {
                policy.fallback_aware_append_if_enabled(&directive, sources)?;
            }
        }

        self.settings.report.alter_policy(&mut policy)?;

        for alter in &self.alters {
            alter.alter(&mut policy)?;
        }

        log::debug!("Built {} policy: {}", policy_type, policy.header_value());
        Ok(policy)
    }

    /// `(header name, header value)` for each built policy with a non-empty value.
    pub fn header_pairs(&self) -> ConfigResult<Vec<(&'static str, String)>> {
        Ok(self
            .build()?
            .into_iter()
            .filter_map(|policy| {
                let value = policy.header_value();
                if value.is_empty() {
                    None
                } else {
                    Some((policy.header_name(), value))
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{DirectiveSetting, PolicySettings, SourceBase, SourceListSetting};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn self_only() -> DirectiveSetting {
        DirectiveSetting::Sources(SourceListSetting {
            base: SourceBase::SelfOrigin,
            ..SourceListSetting::default()
        })
    }

    #[test]
    fn test_disabled_policies_are_skipped() {
        let builder = PolicyBuilder::new(CspSettings::default());
        assert!(builder.build().unwrap().is_empty());
        assert!(builder.header_pairs().unwrap().is_empty());
    }

    #[test]
    fn test_report_only_first() {
        let settings = CspSettings {
            report_only: PolicySettings::enabled().with_directive("default-src", self_only()),
            enforce: PolicySettings::enabled().with_directive("object-src", self_only()),
            ..CspSettings::default()
        };
        let policies = PolicyBuilder::new(settings).build().unwrap();

        assert_eq!(policies.len(), 2);
        assert!(policies[0].is_report_only());
        assert!(!policies[1].is_report_only());
    }

    #[test]
    fn test_empty_policy_has_no_header() {
        let settings = CspSettings {
            enforce: PolicySettings::enabled(),
            ..CspSettings::default()
        };
        let builder = PolicyBuilder::new(settings);

        assert_eq!(builder.build().unwrap().len(), 1);
        assert!(builder.header_pairs().unwrap().is_empty());
    }

    #[test]
    fn test_discovered_sources_respect_enabled_directives() {
        let settings = CspSettings {
            enforce: PolicySettings::enabled()
                .with_directive("script-src", self_only())
                .with_directive("img-src", self_only()),
            ..CspSettings::default()
        };
        let mut discovered = BTreeMap::new();
        discovered.insert("script-src".to_string(), vec!["cdn.example.com".to_string()]);
        discovered.insert("style-src".to_string(), vec!["fonts.example.com".to_string()]);

        let pairs = PolicyBuilder::new(settings)
            .with_discovery(discovered)
            .header_pairs()
            .unwrap();

        // style-src has no fallback in the policy, so it stays at browser defaults
        assert_eq!(
            pairs,
            vec![(
                "Content-Security-Policy",
                "img-src 'self'; script-src 'self' cdn.example.com".to_string()
            )]
        );
    }

    #[test]
    fn test_alters_run_last() {
        let settings = CspSettings {
            enforce: PolicySettings::enabled().with_directive("default-src", self_only()),
            ..CspSettings::default()
        };
        let builder =
            PolicyBuilder::new(settings).with_alter(|policy: &mut Policy| -> ConfigResult<()> {
                policy.append_directive("default-src", "example.com")?;
                Ok(())
            });

        let policies = builder.build().unwrap();
        assert_eq!(policies[0].header_value(), "default-src 'self' example.com");
    }
}
