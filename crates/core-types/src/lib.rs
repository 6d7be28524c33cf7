//! Shared primitives for the request gate workspace.
//!
//! These types describe the calls that flow through the two dispatch mechanisms a page
//! exposes: a callback-style `send` and a future-style `fetch`.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Failure surfaced by a dispatch mechanism, or by the gate when a deferred call is dropped.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("deferred request abandoned before dispatch")]
    Abandoned,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which of the two dispatch mechanisms a call went through.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RequestKind {
    Send,
    Fetch,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Send => f.write_str("send"),
            RequestKind::Fetch => f.write_str("fetch"),
        }
    }
}

/// A callback-style request: opened against a target, then sent with an optional body.
///
/// The target recorded at `open` time is what the gate inspects when `send` is called.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SendRequest {
    pub id: RequestId,
    pub method: String,
    pub target: String,
    pub body: Option<String>,
}

impl SendRequest {
    pub fn open(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            method: method.into(),
            target: target.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A future-style request; the caller awaits a [`FetchResponse`].
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchRequest {
    pub id: RequestId,
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            method: method.into(),
            target: target.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new("GET", target)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchResponse {
    pub request: RequestId,
    pub target: String,
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(request: &FetchRequest, body: impl Into<String>) -> Self {
        Self {
            request: request.id.clone(),
            target: request.target.clone(),
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
