//! Error taxonomy shared by every bridge crate.

use serde_json::Value;
use thiserror::Error;

/// A registry round trip reported failure.
///
/// Carries the runtime-supplied error payload untouched so callers can inspect
/// it. Failures of the call channel itself (a closed host link, a dropped
/// reply) are folded into the same type with a string payload.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("registry error: {}", display_value(.data))]
pub struct RegistryError {
    pub data: Value,
}

impl RegistryError {
    pub fn new(data: impl Into<Value>) -> Self {
        Self { data: data.into() }
    }

    /// The payload rendered the way it is shown to operators.
    pub fn message(&self) -> String {
        display_value(&self.data)
    }
}

/// A request handler failed instead of producing a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    /// Build a failure from an arbitrary value. Strings are taken verbatim,
    /// anything else is rendered as compact JSON.
    pub fn from_value(value: Value) -> Self {
        Self::new(display_value(&value))
    }

    /// Build a failure from any error, keeping only its display message.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(err.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Errors raised by the bridge machinery around the registry and transport.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("malformed event payload: {0}")]
    Decode(String),

    #[error("server is not running: {0}")]
    NotRunning(String),

    #[error("timed out waiting for response on {0}")]
    Timeout(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Render a JSON value for humans: strings without quotes, `null` as empty.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
