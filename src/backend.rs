use async_trait::async_trait;

use crate::{error::BackendError, BackendKind, Operation};

pub mod daemon;
pub mod editor;

/// One replica of the fuzzed document.
///
/// Offsets and lengths are UTF-16 code units. Ops sent to the same backend are
/// applied in the order they were issued.
#[async_trait]
pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    /// Bring up the process or service behind this backend
    async fn start(&mut self) -> Result<(), BackendError>;

    /// Bind the backend to the page `name`, whose initial content is `initial_content`
    async fn open(&mut self, name: &str, initial_content: &str) -> Result<(), BackendError>;

    async fn current_text(&mut self) -> Result<String, BackendError>;

    async fn apply_insert(&mut self, offset: usize, text: &str) -> Result<(), BackendError>;

    async fn apply_delete(&mut self, offset: usize, len: usize) -> Result<(), BackendError>;

    async fn apply(&mut self, op: &Operation) -> Result<(), BackendError> {
        match op {
            Operation::Insert { offset, text } => self.apply_insert(*offset, text).await,
            Operation::Delete { offset, len } => self.apply_delete(*offset, *len).await,
        }
    }

    /// Wait until every edit issued so far has been acknowledged
    async fn settle(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), BackendError>;
}
