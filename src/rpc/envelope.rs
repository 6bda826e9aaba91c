// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire format for module RPC messages.
//!
//! Window channels carry unrelated traffic, so nothing here returns an error
//! for foreign messages: the guards answer `false` and the decoders `None`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol tag carried by every envelope.
pub const PROTOCOL: &str = "portal-module-rpc";

/// Protocol version carried by every envelope.
pub const VERSION: u64 = 1;

/// Code used when a host has no handler for the requested action.
pub const UNKNOWN_ACTION: &str = "UNKNOWN_ACTION";

/// Code for a failed response whose error body is absent or unreadable.
pub const UNSPECIFIED_ERROR: &str = "RPC_ERROR";

const UNSPECIFIED_MESSAGE: &str = "RPC request failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Request,
    Response,
}

/// Error payload of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: String,
    pub message: String,
}

impl RpcErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The generic error for a failed response without a usable body.
    pub fn unspecified() -> Self {
        Self::new(UNSPECIFIED_ERROR, UNSPECIFIED_MESSAGE)
    }

    /// Read whatever a host put in `error`.
    ///
    /// A bare string becomes the message; string `code`/`message` fields are
    /// kept and anything missing falls back to the generic error.
    fn from_wire(error: &Value) -> Self {
        match error {
            Value::String(message) => Self::new(UNSPECIFIED_ERROR, message.as_str()),
            Value::Object(obj) => Self::new(
                obj.get("code").and_then(Value::as_str).unwrap_or(UNSPECIFIED_ERROR),
                obj.get("message").and_then(Value::as_str).unwrap_or(UNSPECIFIED_MESSAGE),
            ),
            _ => Self::unspecified(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    pub protocol: String,
    pub version: u64,
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    /// Correlation id, unique per in-flight call.
    pub id: String,
    pub module_id: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl RpcRequest {
    pub fn new(
        id: impl Into<String>,
        module_id: impl Into<String>,
        action: impl Into<String>,
        payload: Option<Value>,
    ) -> Self {
        Self {
            protocol: PROTOCOL.to_string(),
            version: VERSION,
            kind: EnvelopeKind::Request,
            id: id.into(),
            module_id: module_id.into(),
            action: action.into(),
            payload,
        }
    }

    /// Decode a message if it is a well-formed request.
    pub fn from_message(message: &Value) -> Option<Self> {
        if !is_request(message) {
            return None;
        }
        serde_json::from_value(message.clone()).ok()
    }

    pub fn to_message(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub protocol: String,
    pub version: u64,
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

impl RpcResponse {
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            protocol: PROTOCOL.to_string(),
            version: VERSION,
            kind: EnvelopeKind::Response,
            id: id.into(),
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: RpcErrorBody) -> Self {
        Self {
            protocol: PROTOCOL.to_string(),
            version: VERSION,
            kind: EnvelopeKind::Response,
            id: id.into(),
            ok: false,
            result: None,
            error: Some(error),
        }
    }

    /// Decode a message that passes [`is_response`].
    ///
    /// Once the envelope matches, the call it answers must settle, so a
    /// malformed `error` is normalized rather than rejected.
    pub fn from_message(message: &Value) -> Option<Self> {
        let obj = envelope(message, "response")?;
        let ok = obj.get("ok").and_then(Value::as_bool)?;
        let id = obj.get("id").and_then(Value::as_str)?;
        let present = |field: &str| obj.get(field).filter(|v| !v.is_null());

        Some(Self {
            protocol: PROTOCOL.to_string(),
            version: VERSION,
            kind: EnvelopeKind::Response,
            id: id.to_string(),
            ok,
            result: present("result").cloned(),
            error: present("error").map(RpcErrorBody::from_wire),
        })
    }

    pub fn to_message(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn envelope<'a>(message: &'a Value, kind: &str) -> Option<&'a Map<String, Value>> {
    let obj = message.as_object()?;
    let tagged = obj.get("protocol").and_then(Value::as_str) == Some(PROTOCOL)
        && obj.get("version").and_then(Value::as_u64) == Some(VERSION)
        && obj.get("type").and_then(Value::as_str) == Some(kind)
        && obj.get("id").is_some_and(Value::is_string);
    tagged.then_some(obj)
}

pub fn is_request(message: &Value) -> bool {
    envelope(message, "request").is_some_and(|obj| {
        obj.get("moduleId").is_some_and(Value::is_string)
            && obj.get("action").is_some_and(Value::is_string)
    })
}

pub fn is_response(message: &Value) -> bool {
    envelope(message, "response").is_some_and(|obj| obj.get("ok").is_some_and(Value::is_boolean))
}
