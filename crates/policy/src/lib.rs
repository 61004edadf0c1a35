//! Palisade Policy Crate
//!
//! Builds Content-Security-Policy header values: directive names are validated against a
//! fixed registry, values accumulate per directive, and serialization removes directives
//! made redundant by their fallbacks and minimizes source lists.

pub mod directive;
pub mod error;
pub mod hash;
pub mod policy;
pub mod source_list;
pub mod value;

pub use directive::{DirectiveRegistry, SchemaKind};
pub use error::{PolicyError, PolicyResult};
pub use hash::{calculate_hash, HashAlgorithm};
pub use policy::{Policy, HEADER_NAME, REPORT_ONLY_HEADER_NAME};
pub use source_list::{
    reduce_source_list, POLICY_ANY, POLICY_NONE, POLICY_SELF, POLICY_STRICT_DYNAMIC,
    POLICY_UNSAFE_EVAL, POLICY_UNSAFE_HASHES, POLICY_UNSAFE_INLINE,
};
pub use value::{split_tokens, DirectiveInput, DirectiveValue};
