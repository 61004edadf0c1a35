#![no_main]
//! Policy mutation fuzzing
//!
//! Drives a policy through arbitrary set/append/remove sequences, with both registered
//! and malformed directive names, and checks the serialized header stays well formed.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use palisade_policy::{reduce_source_list, DirectiveRegistry, Policy};

#[derive(Debug, Clone, Arbitrary)]
enum DirectiveName {
    /// Index into the registry
    Known(u8),
    /// Potentially malformed
    Raw(String),
}

#[derive(Debug, Clone, Arbitrary)]
enum Value {
    Text(String),
    Tokens(Vec<String>),
    Flag(bool),
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    Set(DirectiveName, Value),
    Append(DirectiveName, Value),
    FallbackAppend(DirectiveName, Value),
    Remove(DirectiveName),
    ReportOnly(bool),
}

#[derive(Debug, Clone, Arbitrary)]
struct PolicyFuzzInput {
    operations: Vec<Operation>,
    sources: Vec<String>,
}

fn resolve(name: &DirectiveName) -> String {
    let names = DirectiveRegistry::standard().directive_names();
    match name {
        DirectiveName::Known(index) => names[*index as usize % names.len()].to_string(),
        DirectiveName::Raw(raw) => raw.clone(),
    }
}

fn apply(policy: &mut Policy, operation: &Operation) {
    // Errors are expected for malformed names and values; only panics are bugs.
    let _ = match operation {
        Operation::Set(name, value) => match value {
            Value::Text(text) => policy.set_directive(&resolve(name), text.as_str()),
            Value::Tokens(tokens) => policy.set_directive(&resolve(name), tokens.as_slice()),
            Value::Flag(flag) => policy.set_directive(&resolve(name), *flag),
        },
        Operation::Append(name, value) => match value {
            Value::Text(text) => policy.append_directive(&resolve(name), text.as_str()),
            Value::Tokens(tokens) => policy.append_directive(&resolve(name), tokens.as_slice()),
            Value::Flag(flag) => policy.append_directive(&resolve(name), *flag),
        },
        Operation::FallbackAppend(name, value) => match value {
            Value::Text(text) => {
                policy.fallback_aware_append_if_enabled(&resolve(name), text.as_str())
            }
            Value::Tokens(tokens) => {
                policy.fallback_aware_append_if_enabled(&resolve(name), tokens.as_slice())
            }
            Value::Flag(flag) => policy.fallback_aware_append_if_enabled(&resolve(name), *flag),
        },
        Operation::Remove(name) => policy.remove_directive(&resolve(name)),
        Operation::ReportOnly(report_only) => {
            policy.report_only(*report_only);
            Ok(())
        }
    };
}

fuzz_target!(|input: PolicyFuzzInput| {
    let mut policy = Policy::new();
    for operation in input.operations.iter().take(64) {
        apply(&mut policy, operation);
    }

    let value = policy.header_value();
    assert_eq!(value, policy.header_value());

    // Each directive is stored at most once
    let mut seen = std::collections::HashSet::new();
    for name in policy.directive_names() {
        assert!(seen.insert(name), "duplicate directive {}", name);
    }

    let reduced = reduce_source_list(&input.sources);
    assert_eq!(reduce_source_list(&reduced), reduced);
    assert!(reduced.len() <= input.sources.len());
});
