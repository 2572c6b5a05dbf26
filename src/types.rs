use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Protocol version string required on every envelope
pub(crate) const VERSION: &str = "2.0";

/// JSONRPC 2.0 correlation id linking a request to its response
///
/// Equality is structural: a numeric id never matches a textual one, and
/// both round-trip through encoding without coercion. Number ids must not
/// contain decimals, so anything but an integer fails to decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Text(String),
    Number(i64),
    Null,
}

impl RequestId {
    /// Generate a random text id, unique for this engine's lifetime
    pub fn generate() -> Self {
        RequestId::Text(Uuid::new_v4().to_string())
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::Text(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId::Text(id)
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id)
    }
}

/// Outbound call envelope (client functionality)
#[derive(Debug, Serialize)]
pub(crate) struct CallEnvelope<'a, P> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a P>,
    pub id: &'a RequestId,
}

/// Outbound notification envelope - same as a call but with no id
#[derive(Debug, Serialize)]
pub(crate) struct NotificationEnvelope<'a, P> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a P>,
}

/// Outbound success response envelope (server functionality)
#[derive(Debug, Serialize)]
pub(crate) struct SuccessEnvelope<'a, R> {
    pub jsonrpc: &'static str,
    pub result: &'a R,
    pub id: &'a RequestId,
}

/// Outbound error response envelope (server functionality)
#[derive(Debug, Serialize)]
pub(crate) struct FailureEnvelope<'a, E> {
    pub jsonrpc: &'static str,
    pub error: &'a E,
    pub id: &'a RequestId,
}

/// Inbound request shell - decodes just the typed params, lazily,
/// once a registered handler has claimed the message
#[derive(Debug, Deserialize)]
pub(crate) struct IncomingParams<P> {
    pub params: Option<P>,
}

/// Inbound success response shell - `result` must be present
#[derive(Debug, Deserialize)]
pub(crate) struct SuccessBody<R> {
    pub result: R,
}

/// Inbound error response shell - `error` must be present
#[derive(Debug, Deserialize)]
pub(crate) struct FailureBody<E> {
    pub error: E,
}

/// JSONRPC 2.0 Error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorObject {
    /// Error type indicator (must be integer)
    pub code: i32,

    /// Short error description
    pub message: String,

    /// Additional error information (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Pre-defined JSONRPC error codes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
}

impl ErrorCode {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
        }
    }
}

impl ErrorObject {
    /// Create a new error object from a pre-defined code
    pub fn new(code: ErrorCode, data: Option<Value>) -> Self {
        Self {
            code: code as i32,
            message: code.message().to_string(),
            data,
        }
    }

    /// Create a custom error
    pub fn custom(code: i32, message: String, data: Option<Value>) -> Self {
        Self { code, message, data }
    }
}

/// Outcome of an outbound call, delivered to its completion at most once
///
/// Timeout is distinct from a protocol error at the type level: a peer
/// replying with an `error` object is a non-exceptional outcome, not a
/// transport failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R, E> {
    Success(R),
    Error(E),
    Timeout,
}

/// What an inbound call handler returns - serialized into a success or
/// error response envelope tagged with the inbound id
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<R, E> {
    Success(R),
    Error(E),
}
