use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::generator::{CandidateGenerator, GeneratorKind, ModelGenerator, PatternGenerator};
use crate::nameset::{CasePolicy, NameSet};
use crate::normalize::NameNormalizer;
use crate::settings::{ConfigError, PipelineConfig, Settings};
use crate::source::{SourceUnavailable, TextSource};
use crate::validate::NameValidator;

/// Per-candidate stages, applied in this order to every block's candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    Validate,
}

pub const NAME_STAGES: [Stage; 2] = [Stage::Normalize, Stage::Validate];

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub blocks: usize,
    pub blocks_unavailable: usize,
    pub blocks_failed: usize,
    pub candidates: usize,
    pub accepted: usize,
    pub unique: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOutput {
    pub names: Vec<String>,
    pub stats: RunStats,
}

struct BlockOutcome {
    candidates: usize,
    accepted: Vec<String>,
    failed: bool,
}

/// Text blocks in, unique sorted names out.
pub struct Pipeline {
    generator: Box<dyn CandidateGenerator>,
    normalizer: NameNormalizer,
    validator: NameValidator,
    case_policy: CasePolicy,
    allow_partial_runs: bool,
    show_progress: bool,
}

impl Pipeline {
    /// Validate `settings`, then build the pipeline they describe.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Self::new(&settings.validate()?)
    }

    pub fn new(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let generator: Box<dyn CandidateGenerator> = match config.generator {
            GeneratorKind::Pattern => {
                Box::new(PatternGenerator::new(&config.lexicon.honorifics)?)
            }
            GeneratorKind::Model => {
                let recognizer = config
                    .recognizer
                    .clone()
                    .ok_or(ConfigError::MissingRecognizer)?;
                Box::new(ModelGenerator::with_command(recognizer, config.model_timeout)?)
            }
        };
        Ok(Self::with_generator(config, generator))
    }

    /// Build around a caller-supplied generator; `config.generator` is ignored.
    pub fn with_generator(config: &PipelineConfig, generator: Box<dyn CandidateGenerator>) -> Self {
        let lexicon = &config.lexicon;
        Pipeline {
            generator,
            normalizer: NameNormalizer::new(&lexicon.honorifics, &lexicon.suffixes),
            validator: NameValidator::new(config.profile, &lexicon.stoplist, &lexicon.common_words),
            case_policy: config.case_policy,
            allow_partial_runs: config.allow_partial_runs,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn validator(&self) -> &NameValidator {
        &self.validator
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Process every block, then deduplicate and sort once.
    pub fn run<S: AsRef<str> + Sync>(&self, blocks: &[S]) -> PipelineOutput {
        let pb = self.progress_bar(blocks.len());

        // Block order is preserved by collect, so first-seen casing is stable.
        let outcomes: Vec<BlockOutcome> = blocks
            .par_iter()
            .enumerate()
            .map(|(index, block)| {
                let outcome = self.process_block(index, block.as_ref());
                pb.inc(1);
                outcome
            })
            .collect();
        pb.finish_and_clear();

        let mut stats = RunStats {
            blocks: blocks.len(),
            ..RunStats::default()
        };
        let mut names = NameSet::new(self.case_policy);
        for outcome in outcomes {
            stats.candidates += outcome.candidates;
            stats.accepted += outcome.accepted.len();
            if outcome.failed {
                stats.blocks_failed += 1;
            }
            names.extend(outcome.accepted);
        }
        stats.unique = names.len();

        info!(
            "Processed {} blocks ({} failed): {} candidates, {} accepted, {} unique",
            stats.blocks, stats.blocks_failed, stats.candidates, stats.accepted, stats.unique
        );

        PipelineOutput {
            names: names.into_sorted(),
            stats,
        }
    }

    /// Pull every block from `source`, then [`run`](Self::run) over them.
    ///
    /// Unavailable blocks are skipped when partial runs are allowed and
    /// abort the run otherwise.
    pub fn run_source(
        &self,
        source: &mut impl TextSource,
    ) -> Result<PipelineOutput, SourceUnavailable> {
        let mut blocks = Vec::new();
        let mut unavailable = 0;
        while let Some(next) = source.next_block() {
            match next {
                Ok(block) => blocks.push(block),
                Err(e) if self.allow_partial_runs => {
                    warn!("{}; continuing with remaining input", e);
                    unavailable += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let mut output = self.run(&blocks);
        output.stats.blocks_unavailable = unavailable;
        Ok(output)
    }

    fn process_block(&self, index: usize, text: &str) -> BlockOutcome {
        let candidates = match self.generator.generate(text) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(
                    block = index,
                    generator = %self.generator.kind(),
                    "Generation failed, block skipped: {}",
                    e
                );
                return BlockOutcome {
                    candidates: 0,
                    accepted: Vec::new(),
                    failed: true,
                };
            }
        };

        let count = candidates.len();
        let accepted = NAME_STAGES
            .iter()
            .fold(candidates, |names, stage| self.apply(*stage, names));
        debug!(block = index, candidates = count, accepted = accepted.len());

        BlockOutcome {
            candidates: count,
            accepted,
            failed: false,
        }
    }

    fn apply(&self, stage: Stage, names: Vec<String>) -> Vec<String> {
        match stage {
            Stage::Normalize => names
                .iter()
                .map(|name| self.normalizer.normalize(name))
                .collect(),
            Stage::Validate => names
                .into_iter()
                .filter(|name| match self.validator.rejection(name) {
                    Some(rule) => {
                        trace!(name = %name, ?rule, "rejected");
                        false
                    }
                    None => true,
                })
                .collect(),
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks ({per_sec})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{EntityRecognizer, EntitySpan, GenerationError};
    use crate::validate::ValidatorProfile;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn config(profile: ValidatorProfile) -> PipelineConfig {
        let mut settings = Settings::bundled().unwrap();
        settings.validator_profile = profile.as_str().into();
        settings.validate().unwrap()
    }

    fn pattern(profile: ValidatorProfile) -> Pipeline {
        Pipeline::new(&config(profile)).unwrap()
    }

    /// Labels every whole block as a person.
    struct WholeBlock;

    impl EntityRecognizer for WholeBlock {
        fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, GenerationError> {
            Ok(vec![EntitySpan::new(text, "PERSON")])
        }
    }

    /// Fails on blocks containing "corrupt", otherwise labels the block.
    struct Flaky;

    impl EntityRecognizer for Flaky {
        fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, GenerationError> {
            if text.contains("corrupt") {
                Err(GenerationError::Recognizer("cannot parse".into()))
            } else {
                Ok(vec![EntitySpan::new(text, "PERSON")])
            }
        }
    }

    /// Hangs on blocks containing "slow".
    struct Stalls;

    impl EntityRecognizer for Stalls {
        fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, GenerationError> {
            if text.contains("slow") {
                std::thread::sleep(Duration::from_secs(5));
            }
            Ok(vec![EntitySpan::new(text, "PERSON")])
        }
    }

    /// Answers differently on every call.
    #[derive(Default)]
    struct Alternating(AtomicUsize);

    impl EntityRecognizer for Alternating {
        fn recognize(&self, _text: &str) -> Result<Vec<EntitySpan>, GenerationError> {
            let name = match self.0.fetch_add(1, Ordering::SeqCst) % 2 {
                0 => "Ada Lovelace",
                _ => "Grace Hopper",
            };
            Ok(vec![EntitySpan::new(name, "PERSON")])
        }
    }

    fn model(
        recognizer: impl EntityRecognizer + 'static,
        mut config: PipelineConfig,
        timeout: Duration,
    ) -> Pipeline {
        config.generator = GeneratorKind::Model;
        let generator = ModelGenerator::new(Arc::new(recognizer), timeout).unwrap();
        Pipeline::with_generator(&config, Box::new(generator))
    }

    #[test]
    fn honorific_and_stoplist() {
        let p = pattern(ValidatorProfile::Strict);
        let out = p.run(&["Dr. Jane A. Smith visited the White House."]);
        assert_eq!(out.names, vec!["Jane A. Smith"]);
        assert_eq!(out.stats.candidates, 3);
        assert_eq!(out.stats.accepted, 2);
        assert_eq!(out.stats.unique, 1);
    }

    #[test]
    fn long_title_case_run_yields_no_name() {
        for profile in [ValidatorProfile::Strict, ValidatorProfile::Loose] {
            let p = pattern(profile);
            let out = p.run(&["the Royal Society Fellows Annual Dinner was held"]);
            assert!(out.names.is_empty(), "{profile}: {:?}", out.names);
            assert_eq!(out.stats.candidates, 0);
        }
    }

    #[test]
    fn loose_rejects_single_case_blocks() {
        let blocks = ["john smith", "JOHN SMITH", "John Smith"];

        let p = model(WholeBlock, config(ValidatorProfile::Loose), Duration::from_secs(5));
        assert_eq!(p.run(&blocks).names, vec!["John Smith"]);

        let p = pattern(ValidatorProfile::Loose);
        assert_eq!(p.run(&blocks).names, vec!["John Smith"]);
    }

    #[test]
    fn repeated_name_across_blocks_appears_once() {
        let p = pattern(ValidatorProfile::Strict);
        let out = p.run(&["Mary Jane Doe appears here.", "Mary Jane Doe appears again."]);
        assert_eq!(
            out.names.iter().filter(|n| n.as_str() == "Mary Jane Doe").count(),
            1
        );
        assert_eq!(out.names, vec!["Mary Jane Doe"]);
    }

    #[test]
    fn case_insensitive_keeps_first_casing() {
        let mut cfg = config(ValidatorProfile::Loose);
        cfg.case_policy = CasePolicy::Insensitive;
        let p = model(WholeBlock, cfg, Duration::from_secs(5));
        let out = p.run(&["Bob Jones", "Bob JONES", "bob Jones"]);
        assert_eq!(out.names, vec!["Bob Jones"]);
        assert_eq!(out.stats.accepted, 3);
    }

    #[test]
    fn case_sensitive_keeps_variants() {
        let p = model(WholeBlock, config(ValidatorProfile::Loose), Duration::from_secs(5));
        let out = p.run(&["Bob Jones", "Bob JONES"]);
        assert_eq!(out.names, vec!["Bob JONES", "Bob Jones"]);
    }

    #[test]
    fn failing_block_is_skipped() {
        let p = model(Flaky, config(ValidatorProfile::Loose), Duration::from_secs(5));
        let out = p.run(&["Ada Lovelace", "corrupt Page", "Grace Hopper"]);
        assert_eq!(out.names, vec!["Ada Lovelace", "Grace Hopper"]);
        assert_eq!(out.stats.blocks, 3);
        assert_eq!(out.stats.blocks_failed, 1);
    }

    #[test]
    fn timed_out_block_is_skipped() {
        let p = model(Stalls, config(ValidatorProfile::Loose), Duration::from_millis(100));
        let out = p.run(&["Ada Lovelace", "slow Page Here", "Grace Hopper"]);
        assert_eq!(out.names, vec!["Ada Lovelace", "Grace Hopper"]);
        assert_eq!(out.stats.blocks_failed, 1);
    }

    #[test]
    fn model_runs_are_repeatable() {
        let p = model(Alternating::default(), config(ValidatorProfile::Loose), Duration::from_secs(5));
        let first = p.run(&["same page"]);
        let second = p.run(&["same page"]);
        assert_eq!(first.names, second.names);
        assert_eq!(first.stats, second.stats);

        let both = p.run(&["same page", "same page"]);
        assert_eq!(both.names, first.names);
        assert_eq!(both.stats.accepted, 2);
    }

    #[test]
    fn empty_input() {
        let p = pattern(ValidatorProfile::Strict);
        let out = p.run::<&str>(&[]);
        assert!(out.names.is_empty());
        assert_eq!(out.stats, RunStats::default());
    }

    #[test]
    fn run_source_skips_unavailable_when_allowed() {
        let p = pattern(ValidatorProfile::Strict);
        let mut source = vec![
            Ok("Ada Lovelace wrote notes.".to_string()),
            Err(SourceUnavailable {
                path: "page-2.txt".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            }),
            Ok("Grace Hopper found a bug.".to_string()),
        ]
        .into_iter();
        let out = p.run_source(&mut source).unwrap();
        assert_eq!(out.names, vec!["Ada Lovelace", "Grace Hopper"]);
        assert_eq!(out.stats.blocks, 2);
        assert_eq!(out.stats.blocks_unavailable, 1);
    }

    #[test]
    fn run_source_fails_when_partial_runs_disallowed() {
        let mut cfg = config(ValidatorProfile::Strict);
        cfg.allow_partial_runs = false;
        let p = Pipeline::new(&cfg).unwrap();
        let mut source = vec![
            Ok("Ada Lovelace".to_string()),
            Err(SourceUnavailable {
                path: "page-2.txt".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            }),
        ]
        .into_iter();
        let err = p.run_source(&mut source).unwrap_err();
        assert_eq!(err.path.to_str(), Some("page-2.txt"));
    }

    #[test]
    fn model_config_without_recognizer_is_fatal() {
        let mut cfg = config(ValidatorProfile::Loose);
        cfg.generator = GeneratorKind::Model;
        cfg.recognizer = None;
        assert!(matches!(
            Pipeline::new(&cfg),
            Err(ConfigError::MissingRecognizer)
        ));
    }

    #[test]
    fn stages_run_normalize_then_validate() {
        assert_eq!(NAME_STAGES, [Stage::Normalize, Stage::Validate]);
        let p = pattern(ValidatorProfile::Strict);
        // The titled candidate has five tokens until "Prof." is stripped.
        let out = p.run(&["Prof. Anna Maria Louisa Medici PhD"]);
        assert_eq!(out.names, vec!["Anna Maria Louisa Medici"]);
        assert_eq!(out.stats.accepted, 2);
    }
}
