use std::borrow::Cow;
use std::collections::HashSet;

/// How two names are compared when removing duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CasePolicy {
    #[default]
    Sensitive,
    /// Compare lower-cased forms; the first casing seen is the one kept.
    Insensitive,
}

impl CasePolicy {
    pub fn from_case_sensitive(case_sensitive: bool) -> Self {
        if case_sensitive {
            CasePolicy::Sensitive
        } else {
            CasePolicy::Insensitive
        }
    }

    pub fn key<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self {
            CasePolicy::Sensitive => Cow::Borrowed(name),
            CasePolicy::Insensitive => Cow::Owned(name.to_lowercase()),
        }
    }
}

/// Accumulates validated names across all blocks of a run.
#[derive(Debug, Clone, Default)]
pub struct NameSet {
    policy: CasePolicy,
    seen: HashSet<String>,
    names: Vec<String>,
}

impl NameSet {
    pub fn new(policy: CasePolicy) -> Self {
        NameSet {
            policy,
            seen: HashSet::new(),
            names: Vec::new(),
        }
    }

    /// Returns `false` when an equal name (under the policy) was already kept.
    pub fn insert(&mut self, name: String) -> bool {
        let key = self.policy.key(&name).into_owned();
        if self.seen.insert(key) {
            self.names.push(name);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(self.policy.key(name).as_ref())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Consume the set, returning kept names ascending by code point.
    pub fn into_sorted(mut self) -> Vec<String> {
        // `str` ordering is byte-wise UTF-8, which matches code point order.
        self.names.sort_unstable();
        self.names
    }
}

impl Extend<String> for NameSet {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name);
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(policy: CasePolicy, names: &[&str]) -> Vec<String> {
        let mut set = NameSet::new(policy);
        set.extend(names.iter().map(|n| n.to_string()));
        set.into_sorted()
    }

    #[test]
    fn exact_duplicates_collapse() {
        let out = collect(CasePolicy::Sensitive, &["Mary Jane Doe", "Mary Jane Doe"]);
        assert_eq!(out, vec!["Mary Jane Doe"]);
    }

    #[test]
    fn sensitive_keeps_case_variants() {
        let out = collect(CasePolicy::Sensitive, &["Bob Jones", "bob jones"]);
        assert_eq!(out, vec!["Bob Jones", "bob jones"]);
    }

    #[test]
    fn insensitive_keeps_first_seen_casing() {
        let out = collect(CasePolicy::Insensitive, &["Bob Jones", "bob jones"]);
        assert_eq!(out, vec!["Bob Jones"]);

        let out = collect(CasePolicy::Insensitive, &["bob JONES", "Bob Jones"]);
        assert_eq!(out, vec!["bob JONES"]);
    }

    #[test]
    fn sorted_by_code_point() {
        let out = collect(
            CasePolicy::Sensitive,
            &["Zoe Adams", "Ada Lovelace", "Émile Zola", "ada Byron"],
        );
        // Upper-case ASCII < lower-case ASCII < non-ASCII letters.
        assert_eq!(out, vec!["Ada Lovelace", "Zoe Adams", "ada Byron", "Émile Zola"]);
    }

    #[test]
    fn insert_reports_novelty() {
        let mut set = NameSet::new(CasePolicy::Insensitive);
        assert!(set.insert("Ada Lovelace".into()));
        assert!(!set.insert("ADA LOVELACE".into()));
        assert!(set.contains("ada lovelace"));
        assert_eq!(set.len(), 1);
    }
}
