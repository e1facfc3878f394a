//! Msgpack-RPC client side of the editor channel.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

pub mod codec;
pub mod session;

pub use session::NvimSession;

#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("failed to spawn {command:?}: {reason}")]
    Spawn { command: String, reason: String },
    #[error("rpc channel is closed")]
    Disconnected,
    #[error("failed to encode request: {0}")]
    Encode(String),
    #[error("failed to decode message: {0}")]
    Decode(String),
    #[error("{method} failed: {message}")]
    Remote { method: String, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A request that has been queued on a channel and may still be in flight.
#[derive(Debug)]
pub struct PendingCall {
    method: String,
    rx: oneshot::Receiver<Result<Value, RpcError>>,
}

impl PendingCall {
    pub fn new(method: &str) -> (Self, oneshot::Sender<Result<Value, RpcError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                method: method.to_string(),
                rx,
            },
            tx,
        )
    }

    /// A call whose result is known at the time it is issued
    pub fn ready(method: &str, result: Result<Value, RpcError>) -> Self {
        let (call, tx) = Self::new(method);
        let _ = tx.send(result);
        call
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the result if the call already completed, without waiting
    pub fn try_take(&mut self) -> Option<Result<Value, RpcError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(RpcError::Disconnected)),
        }
    }

    pub async fn wait(self) -> Result<Value, RpcError> {
        self.rx.await.unwrap_or(Err(RpcError::Disconnected))
    }
}

/// Request/response channel to an editor process.
///
/// Calls are delivered in the order they are issued.
#[async_trait]
pub trait RpcChannel: Send {
    async fn connect(&mut self) -> Result<(), RpcError>;

    /// Queue a request without waiting for its response
    fn call(&mut self, method: &str, params: Vec<Value>) -> PendingCall;

    async fn request(&mut self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.call(method, params).wait().await
    }

    async fn close(&mut self) -> Result<(), RpcError>;
}
