use serde::Serialize;

use crate::nameset::{CasePolicy, NameSet};

/// Counts reported after removing known names from a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SubtractReport {
    pub original: usize,
    pub kept: usize,
    pub removed: usize,
}

/// Drop every entry of `names` that also appears in `known`.
///
/// Order of the remaining names is preserved.
pub fn subtract_known(
    known: &[String],
    names: Vec<String>,
    policy: CasePolicy,
) -> (Vec<String>, SubtractReport) {
    let known = known_set(known, policy);
    partition(names, |name| !known.contains(name.trim()))
}

/// Keep only the entries of `names` that also appear in `known`.
pub fn common_names(
    known: &[String],
    names: Vec<String>,
    policy: CasePolicy,
) -> (Vec<String>, SubtractReport) {
    let known = known_set(known, policy);
    partition(names, |name| known.contains(name.trim()))
}

fn known_set(known: &[String], policy: CasePolicy) -> NameSet {
    let mut set = NameSet::new(policy);
    set.extend(known.iter().map(|k| k.trim().to_string()));
    set
}

fn partition(names: Vec<String>, keep: impl Fn(&str) -> bool) -> (Vec<String>, SubtractReport) {
    let original = names.len();
    let kept: Vec<String> = names.into_iter().filter(|name| keep(name)).collect();

    let report = SubtractReport {
        original,
        kept: kept.len(),
        removed: original - kept.len(),
    };
    (kept, report)
}

// ── Tests ──
