//! Naming-convention accessor resolution
//!
//! Used only for fields declared without an explicit binding. Methods are
//! scanned in declaration order; static methods are skipped. The first method
//! whose name maps onto a still-unmatched field claims that field.
//!
//! | prefix | candidates tried, in order |
//! |--------|----------------------------|
//! | `is`   | whole name, suffix, suffix with lowercased first char |
//! | `get`  | suffix, suffix with lowercased first char |
//! | `set`  | suffix, suffix with lowercased first char, `is` + suffix |

use std::collections::{BTreeSet, HashMap};

/// Outcome of a convention scan
#[derive(Debug, Default, PartialEq)]
pub struct Resolution {
    /// field name -> method index
    pub getters: HashMap<String, usize>,
    pub setters: HashMap<String, usize>,
    /// fields with no getter, in the order they were expected
    pub missing_getters: Vec<String>,
    pub missing_setters: Vec<String>,
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn getter_candidates(method: &str) -> Vec<String> {
    if let Some(suffix) = method.strip_prefix("is") {
        if !suffix.is_empty() {
            return vec![method.to_string(), suffix.to_string(), lower_first(suffix)];
        }
    }
    if let Some(suffix) = method.strip_prefix("get") {
        if !suffix.is_empty() {
            return vec![suffix.to_string(), lower_first(suffix)];
        }
    }
    Vec::new()
}

fn setter_candidates(method: &str) -> Vec<String> {
    match method.strip_prefix("set") {
        Some(suffix) if !suffix.is_empty() => vec![
            suffix.to_string(),
            lower_first(suffix),
            format!("is{}", suffix),
        ],
        _ => Vec::new(),
    }
}

/// Match `(name, is_static)` methods against the expected field names
pub fn resolve_by_convention(
    methods: &[(&str, bool)],
    expected_getters: &[String],
    expected_setters: &[String],
) -> Resolution {
    let mut want_get: BTreeSet<&str> = expected_getters.iter().map(String::as_str).collect();
    let mut want_set: BTreeSet<&str> = expected_setters.iter().map(String::as_str).collect();
    let mut resolution = Resolution::default();

    for (idx, (name, is_static)) in methods.iter().enumerate() {
        if *is_static {
            continue;
        }

        if let Some(field) = getter_candidates(name)
            .into_iter()
            .find(|c| want_get.contains(c.as_str()))
        {
            want_get.remove(field.as_str());
            resolution.getters.insert(field, idx);
            continue;
        }

        if let Some(field) = setter_candidates(name)
            .into_iter()
            .find(|c| want_set.contains(c.as_str()))
        {
            want_set.remove(field.as_str());
            resolution.setters.insert(field, idx);
        }
    }

    resolution.missing_getters = expected_getters
        .iter()
        .filter(|f| want_get.contains(f.as_str()))
        .cloned()
        .collect();
    resolution.missing_setters = expected_setters
        .iter()
        .filter(|f| want_set.contains(f.as_str()))
        .cloned()
        .collect();
    resolution
}

/// Accessor name recorded for an explicitly bound field
pub fn synthesized_accessor(field: &str) -> String {
    format!("get{}", upper_first(field))
}

/// Mutator name recorded for an explicitly bound field
pub fn synthesized_mutator(field: &str) -> String {
    format!("set{}", upper_first(field))
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
