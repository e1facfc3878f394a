//! Msgpack-RPC framing: `[0, id, method, params]` requests,
//! `[1, id, error, result]` responses and `[2, method, params]` notifications.

use std::io::{Cursor, ErrorKind};

use serde_json::Value;

use super::RpcError;

const REQUEST: u64 = 0;
const RESPONSE: u64 = 1;
const NOTIFICATION: u64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        id: u32,
        method: String,
        params: Vec<Value>,
    },
    Response {
        id: u32,
        error: Option<Value>,
        result: Value,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

pub fn encode_request(id: u32, method: &str, params: &[Value]) -> Result<Vec<u8>, RpcError> {
    rmp_serde::to_vec(&(REQUEST, id, method, params)).map_err(|e| RpcError::Encode(e.to_string()))
}

pub fn encode_response(
    id: u32,
    error: Option<&Value>,
    result: &Value,
) -> Result<Vec<u8>, RpcError> {
    let error = error.unwrap_or(&Value::Null);
    rmp_serde::to_vec(&(RESPONSE, id, error, result)).map_err(|e| RpcError::Encode(e.to_string()))
}

pub fn encode_notification(method: &str, params: &[Value]) -> Result<Vec<u8>, RpcError> {
    rmp_serde::to_vec(&(NOTIFICATION, method, params)).map_err(|e| RpcError::Encode(e.to_string()))
}

/// Decode the first message in `buf`.
///
/// Returns the message and the number of bytes it occupied, or None if `buf`
/// only holds part of a message so far.
pub fn decode(buf: &[u8]) -> Result<Option<(Message, usize)>, RpcError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(buf);
    match rmp_serde::from_read::<_, Value>(&mut cursor) {
        Ok(value) => {
            let used = cursor.position() as usize;
            Ok(Some((parse(value)?, used)))
        }
        Err(
            rmp_serde::decode::Error::InvalidMarkerRead(e)
            | rmp_serde::decode::Error::InvalidDataRead(e),
        ) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(RpcError::Decode(e.to_string())),
    }
}

fn parse(value: Value) -> Result<Message, RpcError> {
    let mut items = match value {
        Value::Array(items) => items,
        x => return Err(RpcError::Decode(format!("expected an array, got {x}"))),
    };

    let kind = items.first().and_then(Value::as_u64);
    match (kind, items.len()) {
        (Some(REQUEST), 4) => Ok(Message::Request {
            id: parse_id(&items[1])?,
            method: parse_method(&items[2])?,
            params: parse_params(items[3].take())?,
        }),
        (Some(RESPONSE), 4) => {
            let error = match items[2].take() {
                Value::Null => None,
                x => Some(x),
            };
            Ok(Message::Response {
                id: parse_id(&items[1])?,
                error,
                result: items[3].take(),
            })
        }
        (Some(NOTIFICATION), 3) => Ok(Message::Notification {
            method: parse_method(&items[1])?,
            params: parse_params(items[2].take())?,
        }),
        _ => Err(RpcError::Decode(format!(
            "unknown message shape {}",
            Value::Array(items)
        ))),
    }
}

fn parse_id(value: &Value) -> Result<u32, RpcError> {
    value
        .as_u64()
        .and_then(|x| u32::try_from(x).ok())
        .ok_or_else(|| RpcError::Decode(format!("invalid message id {value}")))
}

fn parse_method(value: &Value) -> Result<String, RpcError> {
    value
        .as_str()
        .map(|x| x.to_string())
        .ok_or_else(|| RpcError::Decode(format!("invalid method name {value}")))
}

fn parse_params(value: Value) -> Result<Vec<Value>, RpcError> {
    match value {
        Value::Array(params) => Ok(params),
        x => Err(RpcError::Decode(format!("invalid params {x}"))),
    }
}

/// Neovim reports errors as `[type, message]`
pub fn error_message(error: &Value) -> String {
    match error {
        Value::Array(items) => match items.as_slice() {
            [_, Value::String(message)] => message.clone(),
            _ => error.to_string(),
        },
        Value::String(message) => message.clone(),
        x => x.to_string(),
    }
}
