//! In-memory stand-ins for the editor process, used by tests, fuzz targets and benches.

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use arbitrary::Arbitrary;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::{
    backend::{
        daemon::{DaemonAdapter, LocalDaemon, PageDirectory, CONTENT_KEY},
        editor::{forward_chunk, EditorAdapter, COMMAND, EXEC_LUA, GET_LINES},
    },
    config::{EditorConfig, FuzzConfig},
    error::HarnessFault,
    orchestrator::{FuzzOrchestrator, RunReport},
    rpc::{PendingCall, RpcChannel, RpcError},
    text::SharedText,
};

#[cfg(test)]
mod test;

#[derive(Arbitrary, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// The editor buffer is the daemon's page content itself
    Live,
    /// The editor copies the page when it opens it and never syncs again
    Snapshot,
}

/// Observes a [MemoryEditor] after it has been handed to an orchestrator.
#[derive(Debug, Clone, Default)]
pub struct EditorProbe {
    calls: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl EditorProbe {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Emulates the subset of the Neovim API the editor adapter uses, plus the
/// host-side `insert`/`delete` functions of the sync plugin.
pub struct MemoryEditor {
    directory: PageDirectory,
    mode: SyncMode,
    buffer: Option<SharedText>,
    insert_chunk: String,
    delete_chunk: String,
    reachable: bool,
    connected: bool,
    fail_after: Option<usize>,
    probe: EditorProbe,
}

impl MemoryEditor {
    pub fn new(directory: PageDirectory, mode: SyncMode) -> Self {
        let config = EditorConfig::default();
        Self {
            directory,
            mode,
            buffer: None,
            insert_chunk: forward_chunk(&config.insert_fn),
            delete_chunk: forward_chunk(&config.delete_fn),
            reachable: true,
            connected: false,
            fail_after: None,
            probe: EditorProbe::default(),
        }
    }

    /// An editor whose process can never be reached
    pub fn unreachable(directory: PageDirectory) -> Self {
        Self {
            reachable: false,
            ..Self::new(directory, SyncMode::Live)
        }
    }

    /// The channel breaks once `n` calls went through
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Host-side function names, if they differ from what the adapter calls
    pub fn host_functions(mut self, insert_fn: &str, delete_fn: &str) -> Self {
        self.insert_chunk = forward_chunk(insert_fn);
        self.delete_chunk = forward_chunk(delete_fn);
        self
    }

    pub fn probe(&self) -> EditorProbe {
        self.probe.clone()
    }

    fn handle(&mut self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let remote = |message: String| RpcError::Remote {
            method: method.to_string(),
            message,
        };
        match method {
            GET_LINES => {
                let text = self
                    .buffer
                    .as_ref()
                    .map(|x| x.to_string())
                    .unwrap_or_default();
                Ok(json!(text.split('\n').collect::<Vec<_>>()))
            }
            COMMAND => {
                let command = params.first().and_then(Value::as_str).unwrap_or_default();
                let Some(path) = command.strip_prefix("edit! ") else {
                    return Err(remote(format!("E492: Not an editor command: {command}")));
                };
                let path = path.replace("\\ ", " ");
                let name = Path::new(&path)
                    .file_name()
                    .map(|x| x.to_string_lossy().to_string())
                    .unwrap_or_default();
                let content = self
                    .directory
                    .get(&name)
                    .and_then(|page| page.get(CONTENT_KEY).cloned())
                    .ok_or_else(|| remote(format!("E484: Can't open file {path}")))?;
                self.buffer = Some(match self.mode {
                    SyncMode::Live => content,
                    SyncMode::Snapshot => SharedText::new(&content.to_string()),
                });
                Ok(Value::Null)
            }
            EXEC_LUA => {
                let chunk = params.first().and_then(Value::as_str).unwrap_or_default();
                let args = params.get(1).and_then(Value::as_array);
                let offset = args
                    .and_then(|x| x.first())
                    .and_then(Value::as_u64)
                    .map(|x| x as usize);
                let buffer = self
                    .buffer
                    .as_ref()
                    .ok_or_else(|| remote("no buffer is open".to_string()))?;
                let applied = if chunk == self.insert_chunk {
                    let text = args.and_then(|x| x.get(1)).and_then(Value::as_str);
                    match (offset, text) {
                        (Some(offset), Some(text)) => buffer.insert(offset, text),
                        _ => return Err(remote("bad arguments to insert".to_string())),
                    }
                } else if chunk == self.delete_chunk {
                    let len = args.and_then(|x| x.get(1)).and_then(Value::as_u64);
                    match (offset, len) {
                        (Some(offset), Some(len)) => buffer.delete(offset, len as usize),
                        _ => return Err(remote("bad arguments to delete".to_string())),
                    }
                } else {
                    return Err(remote(format!("attempt to call a nil value: {chunk}")));
                };
                applied.map_err(|e| remote(e.to_string()))?;
                Ok(Value::Null)
            }
            _ => Err(remote(format!("Invalid method: {method}"))),
        }
    }
}

#[async_trait]
impl RpcChannel for MemoryEditor {
    async fn connect(&mut self) -> Result<(), RpcError> {
        if !self.reachable {
            return Err(RpcError::Spawn {
                command: "memory-editor".to_string(),
                reason: "unreachable".to_string(),
            });
        }

        self.connected = true;
        Ok(())
    }

    fn call(&mut self, method: &str, params: Vec<Value>) -> PendingCall {
        let calls = {
            let mut calls = self.probe.calls.lock();
            calls.push(method.to_string());
            calls.len()
        };
        if self.fail_after.map(|n| calls > n).unwrap_or(false) {
            self.connected = false;
        }
        if !self.connected {
            return PendingCall::ready(method, Err(RpcError::Disconnected));
        }

        let result = self.handle(method, params);
        PendingCall::ready(method, result)
    }

    async fn close(&mut self) -> Result<(), RpcError> {
        self.connected = false;
        self.probe.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn in_memory_config(seed: u64, rounds: usize) -> FuzzConfig {
    FuzzConfig {
        rounds,
        seed: Some(seed),
        warmup: Duration::ZERO,
        settle: Duration::ZERO,
        ..Default::default()
    }
}

/// Run the orchestrator over a [LocalDaemon] and a [MemoryEditor] bound to it.
pub async fn run_in_memory(
    config: FuzzConfig,
    mode: SyncMode,
) -> Result<RunReport, HarnessFault> {
    let daemon = LocalDaemon::new();
    let channel = MemoryEditor::new(daemon.directory(), mode);
    let editor = EditorAdapter::new(channel, &config.editor).await_edits(config.await_editor_edits);
    FuzzOrchestrator::new(DaemonAdapter::new(daemon), editor, config)
        .expect("default alphabet is valid")
        .run()
        .await
}

#[derive(Arbitrary, Debug, Clone, Copy)]
pub struct FuzzInput {
    pub seed: u64,
    pub rounds: u8,
    pub await_edits: bool,
}

/// A live-synced editor must always converge with the daemon.
pub fn fuzzing(input: FuzzInput) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let mut config = in_memory_config(input.seed, input.rounds as usize);
    config.await_editor_edits = input.await_edits;
    let report = runtime
        .block_on(run_in_memory(config, SyncMode::Live))
        .unwrap();
    assert_eq!(report.verdict, crate::Verdict::Converged, "{:?}", input);
}

/// A snapshot editor must end up with exactly the text its own trace describes.
pub fn fuzzing_snapshot(input: FuzzInput) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let mut config = in_memory_config(input.seed, input.rounds as usize);
    config.await_editor_edits = input.await_edits;
    let report = runtime
        .block_on(run_in_memory(config, SyncMode::Snapshot))
        .unwrap();
    let daemon = report.trace.replay(crate::BackendKind::Daemon).unwrap();
    let editor = report.trace.replay(crate::BackendKind::Editor).unwrap();
    assert_eq!(report.verdict, crate::check(&daemon, &editor));
}
