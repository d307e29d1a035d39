use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Named bundle of rule strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorProfile {
    Loose,
    Strict,
}

impl ValidatorProfile {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "loose" => Some(ValidatorProfile::Loose),
            "strict" => Some(ValidatorProfile::Strict),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorProfile::Loose => "loose",
            ValidatorProfile::Strict => "strict",
        }
    }

    /// Rules this profile applies, in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        match self {
            ValidatorProfile::Loose => vec![
                Rule::MinLength(2),
                Rule::MultipleTokens,
                Rule::MixedCase,
                Rule::AllowedCharacters,
                Rule::Stoplist,
            ],
            ValidatorProfile::Strict => vec![
                Rule::MinLength(3),
                Rule::MultipleTokens,
                Rule::TokenCount { min: 2, max: 4 },
                Rule::CapitalizedTokens,
                Rule::AllowedCharacters,
                Rule::Stoplist,
                Rule::CommonWords,
            ],
        }
    }
}

impl fmt::Display for ValidatorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// At least this many characters.
    MinLength(usize),
    /// Two or more whitespace-separated tokens.
    MultipleTokens,
    TokenCount { min: usize, max: usize },
    /// Not entirely upper-case, not entirely lower-case.
    MixedCase,
    /// Tokens starting with a letter start with an upper-case one.
    CapitalizedTokens,
    /// Letters, space, '.' and '-' only.
    AllowedCharacters,
    Stoplist,
    /// Not made up solely of common non-name words.
    CommonWords,
}

/// Rule-based plausibility filter for normalized names.
#[derive(Debug, Clone)]
pub struct NameValidator {
    profile: ValidatorProfile,
    rules: Vec<Rule>,
    stoplist: HashSet<String>,
    common_words: HashSet<String>,
}

impl NameValidator {
    pub fn new(
        profile: ValidatorProfile,
        stoplist: &BTreeSet<String>,
        common_words: &BTreeSet<String>,
    ) -> Self {
        NameValidator {
            profile,
            rules: profile.rules(),
            stoplist: stoplist.iter().cloned().collect(),
            common_words: common_words.iter().cloned().collect(),
        }
    }

    pub fn profile(&self) -> ValidatorProfile {
        self.profile
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.rejection(name).is_none()
    }

    /// First rule the name fails, if any.
    pub fn rejection(&self, name: &str) -> Option<Rule> {
        self.rules.iter().copied().find(|rule| !self.check(*rule, name))
    }

    fn check(&self, rule: Rule, name: &str) -> bool {
        match rule {
            Rule::MinLength(min) => name.chars().count() >= min,
            Rule::MultipleTokens => name.split_whitespace().nth(1).is_some(),
            Rule::TokenCount { min, max } => {
                let count = name.split_whitespace().count();
                (min..=max).contains(&count)
            }
            Rule::MixedCase => !is_single_case(name),
            Rule::CapitalizedTokens => name
                .split_whitespace()
                .filter_map(|token| token.chars().next())
                .filter(|c| c.is_alphabetic())
                .all(|c| c.is_uppercase()),
            Rule::AllowedCharacters => name
                .chars()
                .all(|c| (c.is_alphabetic() && !c.is_numeric()) || matches!(c, ' ' | '.' | '-')),
            Rule::Stoplist => !self.stoplist.contains(name),
            Rule::CommonWords => !name
                .split_whitespace()
                .all(|token| self.common_words.contains(token)),
        }
    }
}

/// True when the name has cased letters and all of them share one case.
fn is_single_case(name: &str) -> bool {
    let mut upper = false;
    let mut lower = false;
    for c in name.chars() {
        upper |= c.is_uppercase();
        lower |= c.is_lowercase();
    }
    upper != lower
}

// ── Tests ──
