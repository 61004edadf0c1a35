//! Report destinations.
//!
//! A handler runs after settings are applied and may point the policy's `report-uri` at a
//! collector. Each variant validates its own options.

use lazy_static::lazy_static;
use palisade_policy::Policy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::settings::PolicyType;

lazy_static! {
    static ref REPORT_URI_SUBDOMAIN: Regex = Regex::new(r"(?i)^[a-z\d]{4,30}$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "plugin", rename_all = "kebab-case")]
pub enum ReportingHandler {
    /// No reporting
    #[default]
    None,
    /// report-uri.com account
    ReportUriCom { subdomain: String },
    /// Arbitrary collector, configured per policy type
    Uri {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enforce: Option<String>,
        #[serde(
            default,
            rename = "report-only",
            alias = "reportOnly",
            skip_serializing_if = "Option::is_none"
        )]
        report_only: Option<String>,
    },
}

impl ReportingHandler {
    pub fn name(&self) -> &'static str {
        match self {
            ReportingHandler::None => "none",
            ReportingHandler::ReportUriCom { .. } => "report-uri-com",
            ReportingHandler::Uri { .. } => "uri",
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        match self {
            ReportingHandler::None => Ok(()),
            ReportingHandler::ReportUriCom { subdomain } => {
                if REPORT_URI_SUBDOMAIN.is_match(subdomain) {
                    Ok(())
                } else {
                    Err(ConfigError::InvalidReporting(format!(
                        "report-uri.com subdomain must be 4-30 alphanumeric characters, found {:?}",
                        subdomain
                    )))
                }
            }
            ReportingHandler::Uri { enforce, report_only } => {
                for uri in [enforce, report_only].into_iter().flatten() {
                    if !uri.is_empty() {
                        parse_report_uri(uri)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Report URI for a policy of the given type, if this handler sets one.
    pub fn report_uri(&self, policy_type: PolicyType) -> ConfigResult<Option<String>> {
        match self {
            ReportingHandler::None => Ok(None),
            ReportingHandler::ReportUriCom { subdomain } => {
                let endpoint = match policy_type {
                    PolicyType::Enforce => "enforce",
                    PolicyType::ReportOnly => "reportOnly",
                };
                Ok(Some(format!(
                    "https://{}.report-uri.com/r/d/csp/{}",
                    subdomain, endpoint
                )))
            }
            ReportingHandler::Uri { enforce, report_only } => {
                let uri = match policy_type {
                    PolicyType::Enforce => enforce,
                    PolicyType::ReportOnly => report_only,
                };
                match uri.as_deref().filter(|uri| !uri.is_empty()) {
                    Some(uri) => Ok(Some(parse_report_uri(uri)?.to_string())),
                    None => Ok(None),
                }
            }
        }
    }

    /// Point the policy at this handler's collector.
    pub fn alter_policy(&self, policy: &mut Policy) -> ConfigResult<()> {
        let policy_type = if policy.is_report_only() {
            PolicyType::ReportOnly
        } else {
            PolicyType::Enforce
        };

        if let Some(uri) = self.report_uri(policy_type)? {
            log::debug!("Reporting {} violations to {}", policy_type, uri);
            policy.set_directive("report-uri", uri)?;
        }
        Ok(())
    }
}

fn parse_report_uri(uri: &str) -> ConfigResult<Url> {
    let url = Url::parse(uri)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::InvalidUri {
            uri: uri.to_string(),
            reason: format!("unsupported scheme {}", scheme),
        }),
    }
}
