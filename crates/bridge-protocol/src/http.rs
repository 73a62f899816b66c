//! HTTP-shaped request and response payloads carried as events.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, HandlerError};

/// Content type used for every synthetic error response.
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// A header value as it arrives on the wire: one string or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    One(String),
    Many(Vec<String>),
}

impl HeaderValue {
    /// Collapse to a single string.
    ///
    /// A list with more than one entry yields its second entry, a one-entry
    /// list yields that entry and an empty list yields an empty string. A
    /// single string is returned as-is.
    pub fn normalize(self) -> String {
        match self {
            Self::One(value) => value,
            Self::Many(mut values) => match values.len() {
                0 => String::new(),
                1 => values.swap_remove(0),
                _ => values.swap_remove(1),
            },
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

/// Normalize every header of a wire header map.
pub fn normalize_headers(headers: HashMap<String, HeaderValue>) -> HashMap<String, String> {
    headers
        .into_iter()
        .map(|(name, value)| (name, value.normalize()))
        .collect()
}

/// A request event exactly as delivered by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRequest {
    pub id: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, HeaderValue>,
    #[serde(default)]
    pub body: String,
}

impl RawRequest {
    /// A request with no correlation id yet; whoever delivers it assigns one.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Decode an event payload. The runtime may wrap the request in a
    /// one-element argument list, so `[request]` is accepted too.
    pub fn from_event(payload: Value) -> Result<Self, BridgeError> {
        let payload = match payload {
            Value::Array(mut args) if !args.is_empty() => args.swap_remove(0),
            other => other,
        };
        Ok(serde_json::from_value(payload)?)
    }

    pub fn normalize(self) -> Request {
        Request {
            id: self.id,
            method: self.method,
            url: self.url,
            headers: normalize_headers(self.headers),
            body: self.body,
        }
    }
}

/// A request after header normalization, as handed to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id; also the name of the channel the reply goes to.
    pub id: String,
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Request {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// How the receiving side should decode a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseMode {
    Binary,
    #[default]
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseOptions {
    #[serde(default)]
    pub mode: ResponseMode,
}

/// The single reply emitted for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub options: ResponseOptions,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
            options: ResponseOptions::default(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn mode(&self) -> ResponseMode {
        self.options.mode
    }

    /// A plain-text response, as used for every synthetic reply.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body).with_header("Content-Type", TEXT_PLAIN_UTF8)
    }

    /// The reply sent when a handler fails.
    pub fn handler_failure(err: &HandlerError) -> Self {
        Self::text(500, err.message.clone())
    }

    /// Total mapping from a handler outcome to the response to publish.
    pub fn from_handler_result(result: Result<Response, HandlerError>) -> Self {
        match result {
            Ok(response) => response,
            Err(err) => Self::handler_failure(&err),
        }
    }
}
