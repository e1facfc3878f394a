//! The synchronization daemon side of the fuzzed document.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use fxhash::FxHashMap;
use parking_lot::Mutex;

use super::Backend;
use crate::{
    error::{BackendError, DaemonError},
    text::SharedText,
    BackendKind,
};

pub const CONTENT_KEY: &str = "content";

/// A page as exposed by a daemon. Clones observe the same fields.
#[derive(Debug, Clone)]
pub struct PageHandle {
    name: String,
    fields: FxHashMap<String, SharedText>,
}

impl PageHandle {
    pub fn new(name: &str, content: &str) -> Self {
        let mut fields = FxHashMap::default();
        fields.insert(CONTENT_KEY.to_string(), SharedText::new(content));
        Self {
            name: name.to_string(),
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&SharedText> {
        self.fields.get(key)
    }
}

/// The operations the harness needs from a synchronization daemon.
pub trait Daemon: Send {
    fn start(&mut self) -> Result<(), DaemonError>;
    fn create_page(&mut self, name: &str, initial_content: &str) -> Result<(), DaemonError>;
    /// Make every created page visible to the daemon's peers
    fn pull_all_pages(&mut self) -> Result<(), DaemonError>;
    fn find_page(&self, name: &str) -> Option<PageHandle>;

    /// Hand local edits of page `name` to the daemon's sync peers
    fn push_page(&mut self, _name: &str) -> Result<(), DaemonError> {
        Ok(())
    }

    /// Take in edits of page `name` made by the daemon's sync peers
    fn pull_page(&mut self, _name: &str) -> Result<(), DaemonError> {
        Ok(())
    }

    fn stop(&mut self) {}
}

/// The published pages of a [LocalDaemon], shareable with in-process peers.
#[derive(Debug, Clone, Default)]
pub struct PageDirectory {
    pages: Arc<Mutex<FxHashMap<String, PageHandle>>>,
}

impl PageDirectory {
    pub fn get(&self, name: &str) -> Option<PageHandle> {
        self.pages.lock().get(name).cloned()
    }

    fn publish(&self, page: PageHandle) {
        self.pages.lock().insert(page.name.clone(), page);
    }

    fn contains(&self, name: &str) -> bool {
        self.pages.lock().contains_key(name)
    }
}

/// An in-process daemon.
///
/// Created pages stay staged until [Daemon::pull_all_pages]. If a root
/// directory is set, every published page is mirrored to `<root>/<name>`: the
/// editor opens that file, [Daemon::push_page] writes local edits to it and
/// [Daemon::pull_page] loads whatever a sync peer wrote there since.
#[derive(Debug, Default)]
pub struct LocalDaemon {
    started: bool,
    root: Option<PathBuf>,
    staged: Vec<PageHandle>,
    directory: PageDirectory,
}

impl LocalDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Default::default()
        }
    }

    pub fn directory(&self) -> PageDirectory {
        self.directory.clone()
    }

    fn content_of(&self, name: &str) -> Result<SharedText, DaemonError> {
        let page = self
            .directory
            .get(name)
            .ok_or_else(|| DaemonError::PageNotFound(name.to_string()))?;
        page.get(CONTENT_KEY)
            .cloned()
            .ok_or_else(|| DaemonError::MissingField {
                page: name.to_string(),
                key: CONTENT_KEY.to_string(),
            })
    }

    fn ensure_started(&self) -> Result<(), DaemonError> {
        if self.started {
            Ok(())
        } else {
            Err(DaemonError::NotStarted)
        }
    }
}

impl Daemon for LocalDaemon {
    fn start(&mut self) -> Result<(), DaemonError> {
        if let Some(root) = &self.root {
            std::fs::create_dir_all(root)?;
        }

        self.started = true;
        Ok(())
    }

    fn create_page(&mut self, name: &str, initial_content: &str) -> Result<(), DaemonError> {
        self.ensure_started()?;
        if self.directory.contains(name) || self.staged.iter().any(|x| x.name == name) {
            return Err(DaemonError::PageExists(name.to_string()));
        }

        self.staged.push(PageHandle::new(name, initial_content));
        Ok(())
    }

    fn pull_all_pages(&mut self) -> Result<(), DaemonError> {
        self.ensure_started()?;
        for page in std::mem::take(&mut self.staged) {
            if let Some(root) = &self.root {
                let content = page
                    .get(CONTENT_KEY)
                    .map(|x| x.to_string())
                    .unwrap_or_default();
                std::fs::write(root.join(&page.name), content)?;
            }

            tracing::debug!(page = %page.name, "Published page");
            self.directory.publish(page);
        }

        Ok(())
    }

    fn find_page(&self, name: &str) -> Option<PageHandle> {
        self.directory.get(name)
    }

    fn push_page(&mut self, name: &str) -> Result<(), DaemonError> {
        self.ensure_started()?;
        let Some(root) = &self.root else {
            return Ok(());
        };

        let content = self.content_of(name)?;
        std::fs::write(root.join(name), content.to_string())?;
        Ok(())
    }

    fn pull_page(&mut self, name: &str) -> Result<(), DaemonError> {
        self.ensure_started()?;
        let Some(root) = &self.root else {
            return Ok(());
        };

        let on_disk = std::fs::read_to_string(root.join(name))?;
        let content = self.content_of(name)?;
        if content.to_string() != on_disk {
            debug_log::debug_log!("page {name} changed on disk");
            content.set(&on_disk);
        }

        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
    }
}

/// Applies ops directly to the daemon's page content, without suspending.
pub struct DaemonAdapter<D> {
    daemon: D,
    page: Option<OpenPage>,
}

struct OpenPage {
    name: String,
    content: SharedText,
}

impl<D: Daemon> DaemonAdapter<D> {
    pub fn new(daemon: D) -> Self {
        Self { daemon, page: None }
    }

    fn page(&self) -> Result<&OpenPage, BackendError> {
        self.page.as_ref().ok_or(BackendError::NotOpened)
    }

    fn push(&mut self) -> Result<(), BackendError> {
        let name = self.page()?.name.clone();
        self.daemon.push_page(&name)?;
        Ok(())
    }
}

#[async_trait]
impl<D: Daemon> Backend for DaemonAdapter<D> {
    fn kind(&self) -> BackendKind {
        BackendKind::Daemon
    }

    async fn start(&mut self) -> Result<(), BackendError> {
        self.daemon.start()?;
        Ok(())
    }

    async fn open(&mut self, name: &str, initial_content: &str) -> Result<(), BackendError> {
        self.daemon.create_page(name, initial_content)?;
        self.daemon.pull_all_pages()?;
        let page = self
            .daemon
            .find_page(name)
            .ok_or_else(|| DaemonError::PageNotFound(name.to_string()))?;
        let content = page
            .get(CONTENT_KEY)
            .ok_or_else(|| DaemonError::MissingField {
                page: name.to_string(),
                key: CONTENT_KEY.to_string(),
            })?;
        self.page = Some(OpenPage {
            name: name.to_string(),
            content: content.clone(),
        });
        Ok(())
    }

    async fn current_text(&mut self) -> Result<String, BackendError> {
        let name = self.page()?.name.clone();
        self.daemon.pull_page(&name)?;
        Ok(self.page()?.content.to_string())
    }

    async fn apply_insert(&mut self, offset: usize, text: &str) -> Result<(), BackendError> {
        self.page()?.content.insert(offset, text)?;
        self.push()
    }

    async fn apply_delete(&mut self, offset: usize, len: usize) -> Result<(), BackendError> {
        self.page()?.content.delete(offset, len)?;
        self.push()
    }

    async fn shutdown(&mut self) -> Result<(), BackendError> {
        self.page = None;
        self.daemon.stop();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Operation;

    #[test]
    fn page_lifecycle() {
        let mut daemon = LocalDaemon::new();
        assert!(matches!(
            daemon.create_page("file", "hello"),
            Err(DaemonError::NotStarted)
        ));
        daemon.start().unwrap();
        daemon.create_page("file", "hello").unwrap();
        assert!(daemon.find_page("file").is_none());
        daemon.pull_all_pages().unwrap();
        let page = daemon.find_page("file").unwrap();
        assert_eq!(page.name(), "file");
        assert_eq!(page.get(CONTENT_KEY).unwrap().to_string(), "hello");
        assert!(page.get("title").is_none());
        assert!(matches!(
            daemon.create_page("file", "again"),
            Err(DaemonError::PageExists(_))
        ));
    }

    #[test]
    fn handles_share_content() {
        let mut daemon = LocalDaemon::new();
        daemon.start().unwrap();
        daemon.create_page("file", "hello").unwrap();
        daemon.pull_all_pages().unwrap();
        let a = daemon.find_page("file").unwrap();
        let b = daemon.directory().get("file").unwrap();
        a.get(CONTENT_KEY).unwrap().insert(5, "!").unwrap();
        assert_eq!(b.get(CONTENT_KEY).unwrap().to_string(), "hello!");
    }

    #[test]
    fn publish_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut daemon = LocalDaemon::with_root(dir.path());
        daemon.start().unwrap();
        daemon.create_page("file", "hello 🥕").unwrap();
        daemon.pull_all_pages().unwrap();
        let written = std::fs::read_to_string(dir.path().join("file")).unwrap();
        assert_eq!(written, "hello 🥕");
    }

    #[tokio::test]
    async fn adapter_applies_ops() {
        let mut adapter = DaemonAdapter::new(LocalDaemon::new());
        assert!(matches!(
            adapter.current_text().await,
            Err(BackendError::NotOpened)
        ));
        adapter.start().await.unwrap();
        adapter.open("file", "hello").await.unwrap();
        adapter
            .apply(&Operation::Insert {
                offset: 5,
                text: "!".into(),
            })
            .await
            .unwrap();
        assert_eq!(adapter.current_text().await.unwrap(), "hello!");
        adapter
            .apply(&Operation::Delete { offset: 0, len: 1 })
            .await
            .unwrap();
        assert_eq!(adapter.current_text().await.unwrap(), "ello!");
        assert!(adapter
            .apply(&Operation::Delete { offset: 3, len: 3 })
            .await
            .is_err());
        adapter.shutdown().await.unwrap();
        assert!(adapter.current_text().await.is_err());
    }

    #[tokio::test]
    async fn adapter_mirrors_page_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        let mut adapter = DaemonAdapter::new(LocalDaemon::with_root(dir.path()));
        adapter.start().await.unwrap();
        adapter.open("file", "hello").await.unwrap();
        adapter
            .apply(&Operation::Insert {
                offset: 5,
                text: " 🥕".into(),
            })
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello 🥕");

        // a sync peer rewrote the page
        std::fs::write(&path, "hello 🥕 from the editor").unwrap();
        assert_eq!(
            adapter.current_text().await.unwrap(),
            "hello 🥕 from the editor"
        );
        let page = adapter.daemon.find_page("file").unwrap();
        assert_eq!(
            page.get(CONTENT_KEY).unwrap().to_string(),
            "hello 🥕 from the editor"
        );

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            adapter.current_text().await,
            Err(BackendError::Daemon(DaemonError::Io(_)))
        ));
    }

    #[test]
    fn push_and_pull_without_root() {
        let mut daemon = LocalDaemon::new();
        assert!(matches!(daemon.push_page("file"), Err(DaemonError::NotStarted)));
        daemon.start().unwrap();
        daemon.push_page("file").unwrap();
        daemon.pull_page("file").unwrap();
    }
}
