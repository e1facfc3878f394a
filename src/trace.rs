//! Structured record of every round of a run.
//!
//! A trace plus the run's seed is enough to rebuild the ops a failing run
//! issued against each backend.

use serde::{Deserialize, Serialize};

use crate::{error::TextError, text::SharedText, BackendKind, Operation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub round: usize,
    pub backend: BackendKind,
    /// Length of the targeted backend's document when the op was planned
    pub len_before: usize,
    /// None if the planner skipped the round
    pub op: Option<Operation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub seed: u64,
    pub initial_content: String,
    pub rounds: Vec<TraceEvent>,
}

impl Trace {
    pub fn new(seed: u64, initial_content: &str) -> Self {
        Self {
            seed,
            initial_content: initial_content.to_string(),
            rounds: Vec::new(),
        }
    }

    pub fn record(&mut self, event: TraceEvent) {
        tracing::debug!(
            round = event.round,
            backend = %event.backend,
            len_before = event.len_before,
            op = ?event.op,
            "round"
        );
        self.rounds.push(event);
    }

    pub fn ops_for(&self, backend: BackendKind) -> impl Iterator<Item = &Operation> + '_ {
        self.rounds
            .iter()
            .filter(move |x| x.backend == backend)
            .filter_map(|x| x.op.as_ref())
    }

    pub fn skipped(&self) -> usize {
        self.rounds.iter().filter(|x| x.op.is_none()).count()
    }

    /// Replays the ops sent to `backend` on top of the initial content, as if
    /// the other backend never edited the document.
    pub fn replay(&self, backend: BackendKind) -> Result<String, TextError> {
        let text = SharedText::new(&self.initial_content);
        for op in self.ops_for(backend) {
            match op {
                Operation::Insert { offset, text: s } => text.insert(*offset, s)?,
                Operation::Delete { offset, len } => text.delete(*offset, *len)?,
            }
        }

        Ok(text.to_string())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
