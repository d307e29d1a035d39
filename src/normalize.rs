use std::collections::{BTreeSet, HashSet};

/// Cleans one candidate: whitespace collapse, then at most one leading
/// honorific and at most one trailing suffix are removed.
#[derive(Debug, Clone, Default)]
pub struct NameNormalizer {
    honorifics: HashSet<String>,
    suffixes: HashSet<String>,
}

impl NameNormalizer {
    pub fn new(honorifics: &BTreeSet<String>, suffixes: &BTreeSet<String>) -> Self {
        NameNormalizer {
            honorifics: honorifics.iter().map(|h| token_key(h)).collect(),
            suffixes: suffixes.iter().map(|s| token_key(s)).collect(),
        }
    }

    pub fn normalize(&self, candidate: &str) -> String {
        let collapsed = collapse_whitespace(candidate);
        let name = self.strip_honorific(&collapsed);
        self.strip_suffix(name).to_string()
    }

    fn strip_honorific<'a>(&self, name: &'a str) -> &'a str {
        match name.split_once(' ') {
            Some((first, rest)) if self.honorifics.contains(&token_key(first)) => rest,
            _ => name,
        }
    }

    fn strip_suffix<'a>(&self, name: &'a str) -> &'a str {
        match name.rsplit_once(' ') {
            Some((rest, last)) if self.suffixes.contains(&token_key(last)) => rest,
            _ => name,
        }
    }
}

/// Case-insensitive, trailing-period-insensitive form of a table entry or token.
pub(crate) fn token_key(token: &str) -> String {
    token.trim().trim_end_matches('.').to_lowercase()
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ──
