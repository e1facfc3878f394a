//! A msgpack-RPC session with an embedded Neovim process.

use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use fxhash::FxHashMap;
use serde_json::Value;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    process::{Child, Command},
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use super::{
    codec::{self, Message},
    PendingCall, RpcChannel, RpcError,
};

type ResponseTx = oneshot::Sender<Result<Value, RpcError>>;

struct Outbound {
    id: u32,
    method: String,
    bytes: Vec<u8>,
    response_tx: ResponseTx,
}

struct Connection {
    child: Option<Child>,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    io_task: JoinHandle<()>,
}

/// Msgpack-RPC channel framed over the standard streams of a child process.
pub struct NvimSession {
    command: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    next_id: u32,
    conn: Option<Connection>,
}

impl NvimSession {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            cwd: None,
            next_id: 0,
            conn: None,
        }
    }

    pub fn current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Run a session over an already established stream pair.
    pub fn attach<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let io_task = tokio::spawn(run_session_io(reader, writer, outbound_rx));
        Self {
            command: String::new(),
            args: Vec::new(),
            cwd: None,
            next_id: 0,
            conn: Some(Connection {
                child: None,
                outbound_tx,
                io_task,
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn
            .as_ref()
            .map(|x| !x.outbound_tx.is_closed())
            .unwrap_or(false)
    }

    fn spawn(&self) -> Result<Connection, RpcError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let spawn_err = |reason: String| RpcError::Spawn {
            command: self.command.clone(),
            reason,
        };
        let mut child = cmd.spawn().map_err(|e| spawn_err(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_err("failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_err("failed to capture stdout".into()))?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let io_task = tokio::spawn(run_session_io(stdout, stdin, outbound_rx));
        Ok(Connection {
            child: Some(child),
            outbound_tx,
            io_task,
        })
    }
}

#[async_trait]
impl RpcChannel for NvimSession {
    async fn connect(&mut self) -> Result<(), RpcError> {
        if self.conn.is_some() {
            return Ok(());
        }

        tracing::info!(command = %self.command, args = ?self.args, "Starting editor process");
        let conn = self.spawn()?;
        self.conn = Some(conn);
        Ok(())
    }

    fn call(&mut self, method: &str, params: Vec<Value>) -> PendingCall {
        let Some(conn) = &self.conn else {
            return PendingCall::ready(method, Err(RpcError::Disconnected));
        };

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let bytes = match codec::encode_request(id, method, &params) {
            Ok(bytes) => bytes,
            Err(e) => return PendingCall::ready(method, Err(e)),
        };

        let (call, response_tx) = PendingCall::new(method);
        // if the io loop is gone the sender is dropped and the call resolves
        // to `Disconnected`
        let _ = conn.outbound_tx.send(Outbound {
            id,
            method: method.to_string(),
            bytes,
            response_tx,
        });
        call
    }

    async fn close(&mut self) -> Result<(), RpcError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        drop(conn.outbound_tx);
        if let Some(mut child) = conn.child {
            if let Err(e) = child.start_kill() {
                tracing::warn!(error = %e, "Failed to kill editor process");
            }
            let status = child.wait().await?;
            tracing::info!(%status, "Editor process exited");
        }

        conn.io_task.abort();
        Ok(())
    }
}

/// Drives the session until the peer closes its output or the session is dropped.
async fn run_session_io<R, W>(
    mut reader: R,
    mut writer: W,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut pending: FxHashMap<u32, (String, ResponseTx)> = FxHashMap::default();
    let mut read_buf: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; 8192];

    loop {
        tokio::select! {
            out = outbound_rx.recv() => {
                let Some(out) = out else {
                    break;
                };

                if let Err(e) = write_frame(&mut writer, &out.bytes).await {
                    tracing::error!(method = %out.method, error = %e, "Failed to write request");
                    let _ = out.response_tx.send(Err(RpcError::Io(e)));
                    break;
                }

                pending.insert(out.id, (out.method, out.response_tx));
            }

            read = reader.read(&mut chunk) => {
                match read {
                    Ok(0) => {
                        tracing::info!("Editor closed its output");
                        break;
                    }
                    Ok(n) => {
                        read_buf.extend_from_slice(&chunk[..n]);
                        let dispatched =
                            dispatch_frames(&mut read_buf, &mut pending, &mut writer).await;
                        if let Err(e) = dispatched {
                            tracing::error!(error = %e, "Failed to handle editor message");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read from editor");
                        break;
                    }
                }
            }
        }
    }

    for (_, (_, tx)) in pending.drain() {
        let _ = tx.send(Err(RpcError::Disconnected));
    }

    outbound_rx.close();
    while let Ok(out) = outbound_rx.try_recv() {
        let _ = out.response_tx.send(Err(RpcError::Disconnected));
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}

async fn dispatch_frames<W: AsyncWrite + Unpin>(
    read_buf: &mut Vec<u8>,
    pending: &mut FxHashMap<u32, (String, ResponseTx)>,
    writer: &mut W,
) -> Result<(), RpcError> {
    while let Some((msg, used)) = codec::decode(read_buf)? {
        read_buf.drain(..used);
        match msg {
            Message::Response { id, error, result } => {
                let Some((method, tx)) = pending.remove(&id) else {
                    tracing::warn!(id, "Response to an unknown request");
                    continue;
                };

                let result = match error {
                    Some(error) => Err(RpcError::Remote {
                        method,
                        message: codec::error_message(&error),
                    }),
                    None => Ok(result),
                };
                let _ = tx.send(result);
            }
            Message::Notification { method, params } => {
                if method == "nvim_error_event" {
                    tracing::warn!(?params, "Editor reported an error");
                } else {
                    tracing::debug!(%method, "Ignoring notification");
                }
            }
            Message::Request { id, method, .. } => {
                tracing::warn!(%method, "Rejecting request from editor");
                let error = Value::String(format!("{method} is not supported"));
                let bytes = codec::encode_response(id, Some(&error), &Value::Null)?;
                write_frame(writer, &bytes).await?;
            }
        }
    }

    Ok(())
}
