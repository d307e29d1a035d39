//! Layered configuration: bundled defaults, an optional user file,
//! `NAMEX_*` environment variables, then command-line overrides.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::generator::{CommandRecognizer, GeneratorKind};
use crate::nameset::CasePolicy;
use crate::normalize::token_key;
use crate::validate::ValidatorProfile;

const DEFAULT_SETTINGS: &str = include_str!("../config/default.toml");
const ENV_PREFIX: &str = "NAMEX";

/// Configuration that cannot be used. Raised before any block is read.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("unknown generator `{0}` (expected `pattern` or `model`)")]
    UnknownGenerator(String),

    #[error("unknown validator profile `{0}` (expected `loose` or `strict`)")]
    UnknownProfile(String),

    #[error("the model generator needs a [recognizer] command")]
    MissingRecognizer,

    #[error("model_timeout_ms must be greater than zero")]
    ZeroTimeout,

    #[error("invalid {table} entry {entry:?}")]
    InvalidEntry { table: &'static str, entry: String },

    #[error("generator `{generator}` cannot be paired with the `{profile}` profile")]
    IncompatiblePairing {
        generator: GeneratorKind,
        profile: ValidatorProfile,
    },

    #[error("failed to build honorific pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to start model runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Settings as read from the configuration layers, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub generator: String,
    pub validator_profile: String,
    pub case_sensitive_dedup: bool,
    pub stoplist: BTreeSet<String>,
    pub honorifics: BTreeSet<String>,
    pub suffixes: BTreeSet<String>,
    pub common_words: BTreeSet<String>,
    #[serde(default)]
    pub recognizer: Option<CommandRecognizer>,
    pub model_timeout_ms: u64,
    pub allow_partial_runs: bool,
    pub enforce_profile_pairing: bool,
}

/// Command-line values that take precedence over every other layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub generator: Option<String>,
    pub validator_profile: Option<String>,
    pub case_insensitive: bool,
    pub recognizer_command: Option<String>,
    pub recognizer_args: Vec<String>,
    pub model_timeout_ms: Option<u64>,
    pub fail_on_unreadable: bool,
}

impl Settings {
    /// Only the bundled defaults; ignores the environment.
    pub fn bundled() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::from_str(DEFAULT_SETTINGS, FileFormat::Toml))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_SETTINGS, FileFormat::Toml));
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        if let Some(generator) = &overrides.generator {
            builder = builder.set_override("generator", generator.as_str())?;
        }
        if let Some(profile) = &overrides.validator_profile {
            builder = builder.set_override("validator_profile", profile.as_str())?;
        }
        if overrides.case_insensitive {
            builder = builder.set_override("case_sensitive_dedup", false)?;
        }
        if let Some(command) = &overrides.recognizer_command {
            builder = builder
                .set_override("recognizer.command", command.as_str())?
                .set_override("recognizer.args", overrides.recognizer_args.clone())?;
        }
        if let Some(ms) = overrides.model_timeout_ms {
            builder = builder.set_override("model_timeout_ms", ms)?;
        }
        if overrides.fail_on_unreadable {
            builder = builder.set_override("allow_partial_runs", false)?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Check the settings for internal consistency and resolve names to types.
    pub fn validate(&self) -> Result<PipelineConfig, ConfigError> {
        let generator = GeneratorKind::parse(&self.generator)
            .ok_or_else(|| ConfigError::UnknownGenerator(self.generator.clone()))?;
        let profile = ValidatorProfile::parse(&self.validator_profile)
            .ok_or_else(|| ConfigError::UnknownProfile(self.validator_profile.clone()))?;

        check_tokens("honorifics", &self.honorifics)?;
        check_tokens("suffixes", &self.suffixes)?;
        check_phrases("stoplist", &self.stoplist)?;
        check_phrases("common_words", &self.common_words)?;

        let recognizer = match generator {
            GeneratorKind::Model => {
                let recognizer = self
                    .recognizer
                    .clone()
                    .filter(|r| !r.command.trim().is_empty())
                    .ok_or(ConfigError::MissingRecognizer)?;
                if self.model_timeout_ms == 0 {
                    return Err(ConfigError::ZeroTimeout);
                }
                Some(recognizer)
            }
            GeneratorKind::Pattern => None,
        };

        if self.enforce_profile_pairing && !is_paired(generator, profile) {
            return Err(ConfigError::IncompatiblePairing { generator, profile });
        }

        Ok(PipelineConfig {
            generator,
            profile,
            case_policy: CasePolicy::from_case_sensitive(self.case_sensitive_dedup),
            lexicon: Lexicon {
                honorifics: self.honorifics.clone(),
                suffixes: self.suffixes.clone(),
                stoplist: self.stoplist.clone(),
                common_words: self.common_words.clone(),
            },
            recognizer,
            model_timeout: Duration::from_millis(self.model_timeout_ms),
            allow_partial_runs: self.allow_partial_runs,
        })
    }
}

/// Injected word tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Lexicon {
    pub honorifics: BTreeSet<String>,
    pub suffixes: BTreeSet<String>,
    pub stoplist: BTreeSet<String>,
    pub common_words: BTreeSet<String>,
}

/// Validated configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub generator: GeneratorKind,
    pub profile: ValidatorProfile,
    pub case_policy: CasePolicy,
    pub lexicon: Lexicon,
    pub recognizer: Option<CommandRecognizer>,
    pub model_timeout: Duration,
    pub allow_partial_runs: bool,
}

fn is_paired(generator: GeneratorKind, profile: ValidatorProfile) -> bool {
    matches!(
        (generator, profile),
        (GeneratorKind::Pattern, ValidatorProfile::Strict)
            | (GeneratorKind::Model, ValidatorProfile::Loose)
    )
}

/// Honorifics and suffixes are matched as single tokens.
fn check_tokens(table: &'static str, entries: &BTreeSet<String>) -> Result<(), ConfigError> {
    match entries
        .iter()
        .find(|e| token_key(e).is_empty() || e.trim().contains(char::is_whitespace))
    {
        Some(bad) => Err(ConfigError::InvalidEntry {
            table,
            entry: bad.clone(),
        }),
        None => Ok(()),
    }
}

fn check_phrases(table: &'static str, entries: &BTreeSet<String>) -> Result<(), ConfigError> {
    match entries.iter().find(|e| e.trim().is_empty()) {
        Some(bad) => Err(ConfigError::InvalidEntry {
            table,
            entry: bad.clone(),
        }),
        None => Ok(()),
    }
}

// ── Tests ──
