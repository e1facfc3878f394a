use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod config;
pub mod convergence;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod planner;
pub mod rpc;
pub mod text;
pub mod trace;
pub mod utf16;

#[cfg(any(test, feature = "test"))]
pub mod test_utils;

pub use backend::{daemon::DaemonAdapter, editor::EditorAdapter, Backend};
pub use config::FuzzConfig;
pub use convergence::{check, Verdict};
pub use error::{BackendError, HarnessFault};
pub use generator::RandomTextGenerator;
pub use orchestrator::{FuzzOrchestrator, Phase, RunReport};
pub use planner::OperationPlanner;
pub use trace::{Trace, TraceEvent};

/// A single edit addressed in UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Insert { offset: usize, text: String },
    Delete { offset: usize, len: usize },
}

impl Operation {
    /// The signed change in document length once this op is applied
    pub fn len_diff(&self) -> isize {
        match self {
            Operation::Insert { text, .. } => utf16::get_utf16_len(text) as isize,
            Operation::Delete { len, .. } => -(*len as isize),
        }
    }

    /// Whether the op respects the bounds of a document with `doc_len` units
    pub fn fits(&self, doc_len: usize) -> bool {
        match self {
            Operation::Insert { offset, text } => *offset <= doc_len && !text.is_empty(),
            Operation::Delete { offset, len } => *len >= 1 && offset + len <= doc_len,
        }
    }
}

/// Which of the two document replicas a round targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Daemon,
    Editor,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Daemon => f.write_str("daemon"),
            BackendKind::Editor => f.write_str("editor"),
        }
    }
}
