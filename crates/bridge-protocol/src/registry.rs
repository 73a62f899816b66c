//! Registry round-trip shapes exchanged with the runtime that owns the sockets.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RegistryError;

/// Names of the three registry calls, exactly as sent to the runtime.
pub struct Methods;

impl Methods {
    pub const START_SERVER: &str = "StartServer";
    pub const STOP_SERVER: &str = "StopServer";
    pub const LIST_SERVER: &str = "ListServer";
}

/// Separator the runtime uses when listing server ids.
pub const SERVER_ID_SEPARATOR: char = '|';

/// `{flag, data}` reply from the runtime. `ok` is accepted for `flag`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryReply {
    #[serde(alias = "ok")]
    pub flag: bool,
    #[serde(default)]
    pub data: Value,
}

impl RegistryReply {
    pub fn success(data: impl Into<Value>) -> Self {
        Self { flag: true, data: data.into() }
    }

    pub fn failure(data: impl Into<Value>) -> Self {
        Self { flag: false, data: data.into() }
    }

    /// Payload on success, `RegistryError` carrying the payload otherwise.
    pub fn into_result(self) -> Result<Value, RegistryError> {
        if self.flag {
            Ok(self.data)
        } else {
            Err(RegistryError::new(self.data))
        }
    }
}

/// Split a `|`-joined id list, dropping empty segments and keeping order.
pub fn parse_server_ids(joined: &str) -> Vec<String> {
    joined
        .split(SERVER_ID_SEPARATOR)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inverse of [`parse_server_ids`].
pub fn join_server_ids<I, S>(ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for id in ids {
        if !joined.is_empty() {
            joined.push(SERVER_ID_SEPARATOR);
        }
        joined.push_str(id.as_ref());
    }
    joined
}
