//! The live editor side of the fuzzed document, driven over msgpack-RPC.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Backend;
use crate::{
    config::EditorConfig,
    error::BackendError,
    rpc::{PendingCall, RpcChannel},
    BackendKind,
};

pub const GET_LINES: &str = "nvim_buf_get_lines";
pub const EXEC_LUA: &str = "nvim_exec_lua";
pub const COMMAND: &str = "nvim_command";

/// Lua chunk that forwards its arguments to the host-side function `name`
pub fn forward_chunk(name: &str) -> String {
    format!("return {name}(...)")
}

pub struct EditorAdapter<C> {
    channel: C,
    insert_chunk: String,
    delete_chunk: String,
    /// Directory the page names are resolved against
    root: PathBuf,
    await_edits: bool,
    in_flight: Vec<PendingCall>,
}

impl<C: RpcChannel> EditorAdapter<C> {
    pub fn new(channel: C, config: &EditorConfig) -> Self {
        Self {
            channel,
            insert_chunk: forward_chunk(&config.insert_fn),
            delete_chunk: forward_chunk(&config.delete_fn),
            root: PathBuf::from("."),
            await_edits: false,
            in_flight: Vec::new(),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Wait for every edit to be acknowledged before returning from `apply`
    pub fn await_edits(mut self, await_edits: bool) -> Self {
        self.await_edits = await_edits;
        self
    }

    /// Drop acknowledged edits and report the first one that failed.
    fn reap(&mut self) -> Result<(), BackendError> {
        let mut first_err = None;
        self.in_flight.retain_mut(|call| match call.try_take() {
            None => true,
            Some(Ok(_)) => false,
            Some(Err(e)) => {
                first_err.get_or_insert(e);
                false
            }
        });

        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn edit(&mut self, chunk: String, args: Vec<Value>) -> Result<(), BackendError> {
        self.reap()?;
        let call = self
            .channel
            .call(EXEC_LUA, vec![Value::String(chunk), Value::Array(args)]);
        if self.await_edits {
            call.wait().await?;
        } else {
            self.in_flight.push(call);
        }

        Ok(())
    }
}

#[async_trait]
impl<C: RpcChannel> Backend for EditorAdapter<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::Editor
    }

    async fn start(&mut self) -> Result<(), BackendError> {
        self.channel.connect().await?;
        Ok(())
    }

    async fn open(&mut self, name: &str, _initial_content: &str) -> Result<(), BackendError> {
        let path = self.root.join(name);
        let command = format!("edit! {}", escape_path(&path));
        self.channel.request(COMMAND, vec![json!(command)]).await?;
        Ok(())
    }

    async fn current_text(&mut self) -> Result<String, BackendError> {
        let lines = self
            .channel
            .request(GET_LINES, vec![json!(0), json!(0), json!(-1), json!(true)])
            .await?;
        join_lines(lines)
    }

    async fn apply_insert(&mut self, offset: usize, text: &str) -> Result<(), BackendError> {
        let chunk = self.insert_chunk.clone();
        self.edit(chunk, vec![json!(offset), json!(text)]).await
    }

    async fn apply_delete(&mut self, offset: usize, len: usize) -> Result<(), BackendError> {
        let chunk = self.delete_chunk.clone();
        self.edit(chunk, vec![json!(offset), json!(len)]).await
    }

    async fn settle(&mut self) -> Result<(), BackendError> {
        let mut first_err = None;
        for call in std::mem::take(&mut self.in_flight) {
            let method = call.method().to_string();
            if let Err(e) = call.wait().await {
                tracing::debug!(%method, error = %e, "Editor rejected an edit");
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn shutdown(&mut self) -> Result<(), BackendError> {
        self.in_flight.clear();
        self.channel.close().await?;
        Ok(())
    }
}

fn join_lines(lines: Value) -> Result<String, BackendError> {
    let Value::Array(lines) = lines else {
        return Err(BackendError::MalformedResponse(format!(
            "{GET_LINES} returned a non-array value"
        )));
    };

    let mut ans = String::new();
    for (i, line) in lines.iter().enumerate() {
        let line = line.as_str().ok_or_else(|| {
            BackendError::MalformedResponse(format!(
                "{GET_LINES} returned a non-string line {line}"
            ))
        })?;
        if i > 0 {
            ans.push('\n');
        }
        ans.push_str(line);
    }

    Ok(ans)
}

/// Escape a path for use as an Ex command argument
pub(crate) fn escape_path(path: &Path) -> String {
    let mut ans = String::new();
    for c in path.to_string_lossy().chars() {
        if matches!(c, ' ' | '\\' | '%' | '#' | '|' | '"') {
            ans.push('\\');
        }
        ans.push(c);
    }

    ans
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lines_are_joined() {
        assert_eq!(join_lines(json!(["hello"])).unwrap(), "hello");
        assert_eq!(join_lines(json!(["a", "", "🥕"])).unwrap(), "a\n\n🥕");
        assert_eq!(join_lines(json!([])).unwrap(), "");
        assert!(matches!(
            join_lines(json!("hello")),
            Err(BackendError::MalformedResponse(_))
        ));
        assert!(matches!(
            join_lines(json!(["a", 1])),
            Err(BackendError::MalformedResponse(_))
        ));
    }

    #[test]
    fn escaped_paths() {
        assert_eq!(escape_path(Path::new("./file")), "./file");
        assert_eq!(escape_path(Path::new("/tmp/my page")), "/tmp/my\\ page");
        assert_eq!(escape_path(Path::new("a%b#c")), "a\\%b\\#c");
    }

    #[test]
    fn chunks() {
        assert_eq!(forward_chunk("insert"), "return insert(...)");
    }
}
