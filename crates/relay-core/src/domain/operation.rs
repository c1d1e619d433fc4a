//! Operation model: what callers enqueue, what gets persisted, and what the
//! transport finally sees.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::OperationId;

/// Header names that must never be persisted (compared case-insensitively).
pub const CREDENTIAL_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "x-api-key",
    "x-auth-token",
];

/// Header injected from the token provider right before a call.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

pub fn is_credential_header(name: &str) -> bool {
    CREDENTIAL_HEADERS
        .iter()
        .any(|forbidden| forbidden.eq_ignore_ascii_case(name))
}

/// State-mutating HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation as submitted by the caller, before the queue assigns
/// identity and bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub method: Method,
    pub target: String,
    pub body: Value,
    pub headers: BTreeMap<String, String>,
    pub priority: Option<i32>,
    pub meta: Map<String, Value>,
}

impl NewOperation {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            body: Value::Null,
            headers: BTreeMap::new(),
            priority: None,
            meta: Map::new(),
        }
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::Post, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::Put, target)
    }

    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(Method::Patch, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::Delete, target)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

/// A pending operation. This is exactly the record the store persists.
///
/// Invariants:
/// - `headers` never contain a credential header.
/// - `retries` only grows while the entry exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: OperationId,
    pub method: Method,
    pub target: String,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub meta: Map<String, Value>,

    /// Earliest instant the next attempt may run (set after a retryable failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueuedOperation {
    /// Normalize a caller submission: strip credentials, default the priority,
    /// start the retry count at zero.
    pub fn from_new(id: OperationId, created_at: DateTime<Utc>, op: NewOperation) -> Self {
        let headers = op
            .headers
            .into_iter()
            .filter(|(name, _)| !is_credential_header(name))
            .collect();

        Self {
            id,
            method: op.method,
            target: op.target,
            body: op.body,
            headers,
            created_at,
            retries: 0,
            priority: op.priority.unwrap_or(0),
            meta: op.meta,
            not_before: None,
            last_error: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.not_before.is_none_or(|at| at <= now)
    }

    /// Build the request handed to the transport for this attempt.
    pub fn to_request(&self) -> OutgoingRequest {
        OutgoingRequest {
            id: self.id,
            method: self.method,
            target: self.target.clone(),
            body: self.body.clone(),
            headers: self.headers.clone(),
            attempt: self.retries,
        }
    }
}

/// The fully-resolved request passed to the transport. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    pub id: OperationId,
    pub method: Method,
    pub target: String,
    pub body: Value,
    pub headers: BTreeMap<String, String>,

    /// Zero-based attempt number (equals the entry's retry count).
    pub attempt: u32,
}

impl OutgoingRequest {
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.headers
            .insert(AUTHORIZATION_HEADER.to_string(), format!("Bearer {token}"));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What a successful transport call returns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeliveryResponse {
    pub status: u16,
    pub body: Value,
}

impl DeliveryResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok() -> Self {
        Self::new(200, Value::Null)
    }
}
