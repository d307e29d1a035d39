use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

use super::{CandidateGenerator, CommandRecognizer, GenerationError, GeneratorKind};

const PERSON_LABEL: &str = "person";

/// One labelled span reported by a recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub text: String,
    pub label: String,
}

impl EntitySpan {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        EntitySpan {
            text: text.into(),
            label: label.into(),
        }
    }

    pub fn is_person(&self) -> bool {
        self.label.eq_ignore_ascii_case(PERSON_LABEL)
    }
}

/// In-process named-entity recognition capability.
///
/// Implementations return spans in document order. A call may block; the
/// [`ModelGenerator`] bounds it with a timeout.
pub trait EntityRecognizer: Send + Sync {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, GenerationError>;
}

enum Backend {
    InProcess(Arc<dyn EntityRecognizer>),
    Command(CommandRecognizer),
}

/// First outcome per block text; failures are kept as their message.
type Memo = HashMap<String, Result<Vec<String>, String>>;

/// Candidates are the spans a recognizer labels "person".
///
/// Every call is bounded by `timeout` on a private tokio runtime. The first
/// outcome for a given block text is remembered and replayed, so identical
/// blocks always get identical candidates from one generator.
pub struct ModelGenerator {
    backend: Backend,
    timeout: Duration,
    memo: Mutex<Memo>,
    runtime: Option<Runtime>,
}

impl ModelGenerator {
    /// Runs `recognizer` on the blocking pool; a timed-out call is abandoned.
    pub fn new(recognizer: Arc<dyn EntityRecognizer>, timeout: Duration) -> std::io::Result<Self> {
        Self::build(Backend::InProcess(recognizer), timeout)
    }

    /// Runs an external program per block; a timed-out program is killed.
    pub fn with_command(recognizer: CommandRecognizer, timeout: Duration) -> std::io::Result<Self> {
        Self::build(Backend::Command(recognizer), timeout)
    }

    fn build(backend: Backend, timeout: Duration) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("namex-model")
            .enable_all()
            .build()?;
        Ok(ModelGenerator {
            backend,
            timeout,
            memo: Mutex::new(HashMap::new()),
            runtime: Some(runtime),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn memo(&self) -> MutexGuard<'_, Memo> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, GenerationError> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| GenerationError::Aborted("runtime shut down".into()))?;
        let timeout = self.timeout;

        match &self.backend {
            Backend::Command(command) => runtime.block_on(command.recognize(text, timeout)),
            Backend::InProcess(recognizer) => {
                let recognizer = Arc::clone(recognizer);
                let owned = text.to_string();
                runtime.block_on(async move {
                    let task = tokio::task::spawn_blocking(move || recognizer.recognize(&owned));
                    match tokio::time::timeout(timeout, task).await {
                        Ok(Ok(result)) => result,
                        Ok(Err(join)) => Err(GenerationError::Aborted(join.to_string())),
                        Err(_) => Err(GenerationError::TimedOut(timeout)),
                    }
                })
            }
        }
    }
}

impl CandidateGenerator for ModelGenerator {
    fn generate(&self, text: &str) -> Result<Vec<String>, GenerationError> {
        if let Some(first) = self.memo().get(text) {
            return first.clone().map_err(GenerationError::Repeated);
        }

        let fresh = self.recognize(text).map(|spans| {
            spans
                .into_iter()
                .filter(EntitySpan::is_person)
                .map(|span| span.text)
                .collect::<Vec<_>>()
        });

        // An identical block on another thread may have finished first.
        match self.memo().entry(text.to_string()) {
            Entry::Occupied(first) => first.get().clone().map_err(GenerationError::Repeated),
            Entry::Vacant(slot) => {
                slot.insert(match &fresh {
                    Ok(names) => Ok(names.clone()),
                    Err(e) => Err(e.to_string()),
                });
                fresh
            }
        }
    }

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Model
    }
}

impl Drop for ModelGenerator {
    fn drop(&mut self) {
        // Timed-out in-process calls may still be running; don't wait for them.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

// ── Tests ──
