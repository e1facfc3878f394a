//! Runs one differential fuzz round-trip against a local daemon and a Neovim process.
//!
//! The daemon side is a [LocalDaemon] that mirrors the page to `<root>/<page>`:
//! its edits are written to that file and the file is reloaded before every
//! read. The editor opens the same file. Whatever keeps the two in sync meets
//! them there: either the sync daemon under test watching `root`, or the
//! editor plugin itself (`plugin/sync.lua` writes the buffer after each edit
//! and reloads it when the file changes).
//!
//! The editor must define the host functions `insert` and `delete`; without a
//! plugin every editor edit fails and the run ends with a harness fault.
//!
//! Environment:
//! - `FUZZ_CONFIG`: path to a JSON [FuzzConfig]
//! - `FUZZ_SEED`, `FUZZ_ROUNDS`: override the seed and the number of rounds
//! - `FUZZ_ROOT`: directory shared with the sync peer, a temporary one by default
//! - `FUZZ_PLUGIN`: Lua file defining the host functions
//! - `FUZZ_TRACE`: where the trace is written when the run does not converge
//! - `RUST_LOG`: log filter, `info` by default

use std::{path::PathBuf, process::ExitCode};

use crdt_sync_fuzz::{
    backend::daemon::LocalDaemon, rpc::NvimSession, DaemonAdapter, EditorAdapter, FuzzConfig,
    FuzzOrchestrator, Trace, Verdict,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_TRACE_PATH: &str = "fuzz-trace.json";

fn load_config() -> Result<FuzzConfig, String> {
    let mut config = match std::env::var("FUZZ_CONFIG") {
        Ok(path) => {
            let s = std::fs::read_to_string(&path).map_err(|e| format!("{path}: {e}"))?;
            serde_json::from_str(&s).map_err(|e| format!("{path}: {e}"))?
        }
        Err(_) => FuzzConfig::default(),
    };
    if let Ok(seed) = std::env::var("FUZZ_SEED") {
        config.seed = Some(seed.parse().map_err(|e| format!("FUZZ_SEED: {e}"))?);
    }
    if let Ok(rounds) = std::env::var("FUZZ_ROUNDS") {
        config.rounds = rounds.parse().map_err(|e| format!("FUZZ_ROUNDS: {e}"))?;
    }
    if let Ok(root) = std::env::var("FUZZ_ROOT") {
        config.root = Some(root.into());
    }
    if let Ok(plugin) = std::env::var("FUZZ_PLUGIN") {
        config.editor.plugin = Some(plugin.into());
    }

    Ok(config)
}

fn dump_trace(trace: &Trace) {
    let path = std::env::var("FUZZ_TRACE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_TRACE_PATH));
    let written = trace
        .to_json()
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
    match written {
        Ok(()) => tracing::info!(path = %path.display(), "Wrote trace"),
        Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to write trace"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };
    if config.editor.plugin.is_none() {
        tracing::warn!("No editor plugin configured, `insert`/`delete` must already be defined");
    }

    // kept alive until the run ends
    let mut scratch = None;
    let root = match config.root.clone() {
        Some(root) => root,
        None => match tempfile::tempdir() {
            Ok(dir) => scratch.insert(dir).path().to_path_buf(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create the page directory");
                return ExitCode::from(2);
            }
        },
    };

    let daemon = DaemonAdapter::new(LocalDaemon::with_root(&root));
    let session =
        NvimSession::new(&config.editor.command, config.editor.launch_args()).current_dir(&root);
    let editor = EditorAdapter::new(session, &config.editor)
        .with_root(&root)
        .await_edits(config.await_editor_edits);
    let orchestrator = match FuzzOrchestrator::new(daemon, editor, config) {
        Ok(x) => x,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    let seed = orchestrator.seed();
    let (result, trace) = orchestrator.run_traced().await;
    match result {
        Ok(Verdict::Converged) => {
            println!("converged (seed {seed})");
            ExitCode::SUCCESS
        }
        Ok(verdict @ Verdict::Diverged { .. }) => {
            println!(
                "diverged (seed {seed}) at unit {:?}",
                verdict.first_difference()
            );
            if let Verdict::Diverged {
                daemon_text,
                editor_text,
            } = &verdict
            {
                println!("daemon: {daemon_text:?}");
                println!("editor: {editor_text:?}");
            }
            dump_trace(&trace);
            ExitCode::FAILURE
        }
        Err(fault) => {
            println!("harness fault (seed {seed}): {fault}");
            dump_trace(&trace);
            ExitCode::from(3)
        }
    }
}
