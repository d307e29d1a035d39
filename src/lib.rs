//! Person-name extraction from page text.
//!
//! Four stages, run per block and then once over the whole input:
//! candidate generation (regex heuristics or an external recognizer),
//! normalization, rule-based validation, and deduplication with sorting.

pub mod generator;
pub mod nameset;
pub mod normalize;
pub mod pipeline;
pub mod settings;
pub mod source;
pub mod subtract;
pub mod validate;

pub use generator::{CandidateGenerator, GenerationError, GeneratorKind};
pub use nameset::{CasePolicy, NameSet};
pub use normalize::NameNormalizer;
pub use pipeline::{Pipeline, PipelineOutput, RunStats};
pub use settings::{ConfigError, Lexicon, Overrides, PipelineConfig, Settings};
pub use source::{FileSource, LineSink, SourceUnavailable, TextSource, WriterSink};
pub use validate::{NameValidator, Rule, ValidatorProfile};
