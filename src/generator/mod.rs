pub mod command;
pub mod model;
pub mod pattern;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use command::CommandRecognizer;
pub use model::{EntityRecognizer, EntitySpan, ModelGenerator};
pub use pattern::PatternGenerator;

/// Which candidate strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Pattern,
    Model,
}

impl GeneratorKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "pattern" => Some(GeneratorKind::Pattern),
            "model" => Some(GeneratorKind::Model),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::Pattern => "pattern",
            GeneratorKind::Model => "model",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A block the generator could not process. The orchestrator logs it and
/// treats the block as having no candidates.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("recognizer failed: {0}")]
    Recognizer(String),

    #[error("failed to start recognizer command `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("recognizer I/O failed")]
    Io(#[from] std::io::Error),

    #[error("recognizer exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("malformed recognizer output")]
    Output(#[from] serde_json::Error),

    #[error("recognizer timed out after {0:?}")]
    TimedOut(Duration),

    #[error("recognizer task aborted: {0}")]
    Aborted(String),

    #[error("recognizer failed earlier on an identical block: {0}")]
    Repeated(String),
}

/// Scans one text block for name-shaped substrings.
///
/// Candidates come back in order of first occurrence and may overlap or
/// repeat; deduplication happens downstream.
pub trait CandidateGenerator: Send + Sync {
    fn generate(&self, text: &str) -> Result<Vec<String>, GenerationError>;

    fn kind(&self) -> GeneratorKind;
}
