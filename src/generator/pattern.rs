use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{CandidateGenerator, GenerationError, GeneratorKind};

/// A whole run of title-case tokens, with at most one middle initial after
/// the first.
const NAME_PATTERN: &str = r"(?P<name>[A-Z][a-z]+(?:\s+[A-Z]\.?)?(?:\s+[A-Z][a-z]+)+)\b";

/// Longer runs are headings or institutions, not names.
const MAX_TITLE_TOKENS: usize = 4;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\b{NAME_PATTERN}")).unwrap());

/// Regex heuristics: bare title-case runs, plus the same runs preceded by
/// an honorific from the configured set.
///
/// A run of more than four title-case tokens is dropped whole, never cut
/// down to a name-sized prefix.
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    titled: Option<Regex>,
}

impl PatternGenerator {
    pub fn new(honorifics: &BTreeSet<String>) -> Result<Self, regex::Error> {
        let mut alternatives: Vec<String> = honorifics
            .iter()
            .map(|h| h.trim().trim_end_matches('.'))
            .filter(|h| !h.is_empty())
            .map(regex::escape)
            .collect();
        alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        alternatives.dedup();

        let titled = if alternatives.is_empty() {
            None
        } else {
            let pattern = format!(r"\b(?i:{})\.?\s+{NAME_PATTERN}", alternatives.join("|"));
            Some(Regex::new(&pattern)?)
        };

        Ok(PatternGenerator { titled })
    }
}

impl CandidateGenerator for PatternGenerator {
    fn generate(&self, text: &str) -> Result<Vec<String>, GenerationError> {
        let mut spans: Vec<(usize, &str)> = name_spans(&NAME_RE, text).collect();
        if let Some(titled) = &self.titled {
            spans.extend(name_spans(titled, text));
        }
        // Stable: a bare match sorts before a titled one starting at the same offset.
        spans.sort_by_key(|(start, _)| *start);

        Ok(spans.into_iter().map(|(_, s)| s.to_string()).collect())
    }

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Pattern
    }
}

fn name_spans<'t>(re: &'t Regex, text: &'t str) -> impl Iterator<Item = (usize, &'t str)> + 't {
    re.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let run = caps.name("name")?.as_str();
        (title_tokens(run) <= MAX_TITLE_TOKENS).then(|| (whole.start(), whole.as_str()))
    })
}

/// Tokens other than single-letter initials.
fn title_tokens(run: &str) -> usize {
    run.split_whitespace()
        .filter(|t| t.trim_end_matches('.').chars().count() > 1)
        .count()
}

// ── Tests ──
