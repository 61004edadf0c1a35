//! Palisade Config Crate
//!
//! Site-level settings for Palisade policies: a JSON settings document, validation of
//! the values it holds, discovery of third-party hosts, report destinations, and the
//! builder that turns all of it into response headers.

pub mod builder;
pub mod discovery;
pub mod error;
pub mod reporting;
pub mod settings;
pub mod validation;

pub use builder::{PolicyAlter, PolicyBuilder};
pub use discovery::{
    host_from_uri, AssetLocation, LibraryDefinition, LibraryPolicyBuilder, MarkupSourceDiscovery,
    SourceDiscovery,
};
pub use error::{ConfigError, ConfigResult};
pub use reporting::ReportingHandler;
pub use settings::{
    CspSettings, DirectiveSetting, PolicySettings, PolicyType, SourceBase, SourceListSetting,
    ENFORCE_ONLY_DIRECTIVES, WEBRTC_VALUES,
};
pub use validation::{
    is_valid_flag, is_valid_host, is_valid_media_type, is_valid_scheme_source, split_source_text,
};
