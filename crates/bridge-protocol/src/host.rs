//! Frames of the newline-delimited JSON link to a host process.
//!
//! Protocol flow:
//!   1. Bridge sends: { type: "call", id, method: "StartServer", params: [address, id] }
//!   2. Host replies: { type: "reply", id, result: { flag, data } }
//!   3. Host delivers requests: { type: "event", name: <server id>, data: <request> }
//!   4. Bridge answers: { type: "event", name: <request id>, data: <response> }

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::RegistryReply;

/// Monotonic id pairing a registry call with its reply.
pub type CallId = u64;

/// One line on the host link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostFrame {
    /// A named event, in either direction.
    Event {
        name: String,
        #[serde(default)]
        data: Value,
    },
    /// Bridge → host registry call.
    Call {
        id: CallId,
        method: String,
        #[serde(default)]
        params: Vec<Value>,
    },
    /// Host → bridge registry reply.
    Reply { id: CallId, result: RegistryReply },
}

impl HostFrame {
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self::Event { name: name.into(), data }
    }

    pub fn call(id: CallId, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self::Call { id, method: method.into(), params }
    }

    pub fn reply(id: CallId, result: RegistryReply) -> Self {
        Self::Reply { id, result }
    }

    /// Serialize as a single protocol line, newline included.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }
}
