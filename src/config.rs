use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    backend::editor::escape_path,
    error::GeneratorError,
    generator::{RandomTextGenerator, DEFAULT_ALPHABET},
    planner::{OperationPlanner, DEFAULT_MAX_INSERT_LEN},
};

pub const DEFAULT_PAGE_NAME: &str = "file";
pub const DEFAULT_SEED_CONTENT: &str = "hello";
pub const DEFAULT_ROUNDS: usize = 100;
pub const DEFAULT_WARMUP: Duration = Duration::from_millis(1000);
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(1000);

/// Parameters of one fuzz run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzConfig {
    pub page_name: String,
    pub seed_content: String,
    pub rounds: usize,
    /// Wait after spawning the editor, before it is expected to answer
    pub warmup: Duration,
    /// Wait after the last round, before the texts are compared
    pub settle: Duration,
    /// Random seed; a fresh one is drawn and recorded in the trace if None
    pub seed: Option<u64>,
    /// Wait for each editor edit to be acknowledged before the next round
    pub await_editor_edits: bool,
    pub editor: EditorConfig,
    pub alphabet: Vec<char>,
    pub max_insert_len: usize,
    /// Directory pages are mirrored to and opened from. It is the meeting
    /// point with the sync peer, a fresh temporary directory if None
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Host-side Lua function called as `insert(offset, text)`
    pub insert_fn: String,
    /// Host-side Lua function called as `delete(offset, length)`
    pub delete_fn: String,
    /// Lua file defining `insert_fn` and `delete_fn`, sourced at startup
    pub plugin: Option<PathBuf>,
}

impl EditorConfig {
    /// Arguments the editor is spawned with
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(plugin) = &self.plugin {
            args.push("-c".to_string());
            args.push(format!("luafile {}", escape_path(plugin)));
        }

        args
    }
}

impl FuzzConfig {
    pub fn planner(&self) -> Result<OperationPlanner, GeneratorError> {
        let generator = RandomTextGenerator::new(self.alphabet.clone())?;
        Ok(OperationPlanner::new(generator, self.max_insert_len))
    }
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            page_name: DEFAULT_PAGE_NAME.to_string(),
            seed_content: DEFAULT_SEED_CONTENT.to_string(),
            rounds: DEFAULT_ROUNDS,
            warmup: DEFAULT_WARMUP,
            settle: DEFAULT_SETTLE,
            seed: None,
            await_editor_edits: false,
            editor: EditorConfig::default(),
            alphabet: DEFAULT_ALPHABET.to_vec(),
            max_insert_len: DEFAULT_MAX_INSERT_LEN,
            root: None,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            command: "nvim".to_string(),
            args: vec!["--embed".into(), "--headless".into()],
            insert_fn: "insert".to_string(),
            delete_fn: "delete".to_string(),
            plugin: None,
        }
    }
}
