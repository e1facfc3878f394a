use crate::{orchestrator::Phase, rpc::RpcError, BackendKind, Operation};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TextError {
    #[error("index {index} out of range (len = {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("range {start}..{end} out of range (len = {len})")]
    RangeOutOfRange { start: usize, end: usize, len: usize },
    #[error("index {index} falls inside a character")]
    NotCharBoundary { index: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum DaemonError {
    #[error("daemon is not started")]
    NotStarted,
    #[error("page {0:?} already exists")]
    PageExists(String),
    #[error("page {0:?} not found")]
    PageNotFound(String),
    #[error("page {page:?} has no {key:?} field")]
    MissingField { page: String, key: String },
    #[error(transparent)]
    Text(#[from] TextError),
    #[error("failed to publish page: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum GeneratorError {
    #[error("alphabet has no character of width 1")]
    NoUnitWidthChar,
}

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error(transparent)]
    Daemon(#[from] DaemonError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("backend used before it was opened")]
    NotOpened,
    #[error("no response within {0:?}")]
    Timeout(std::time::Duration),
}

impl From<TextError> for BackendError {
    fn from(value: TextError) -> Self {
        BackendError::Daemon(DaemonError::Text(value))
    }
}

/// A fault of the harness itself, as opposed to a divergence of the systems under test.
#[derive(thiserror::Error, Debug)]
#[error("harness fault in {phase:?} on {backend} (round {round:?}, op {op:?}): {source}")]
pub struct HarnessFault {
    pub phase: Phase,
    pub backend: BackendKind,
    pub round: Option<usize>,
    pub op: Option<Operation>,
    #[source]
    pub source: BackendError,
}

impl HarnessFault {
    pub fn new(phase: Phase, backend: BackendKind, source: BackendError) -> Self {
        Self {
            phase,
            backend,
            round: None,
            op: None,
            source,
        }
    }

    pub fn at_round(mut self, round: usize, op: Option<Operation>) -> Self {
        self.round = Some(round);
        self.op = op;
        self
    }
}
