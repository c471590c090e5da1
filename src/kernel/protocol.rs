//! Request and reply payloads exchanged with the notebook front-end
//!
//! Only message contents are modelled here; framing and signing belong to
//! the transport.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Contents of an `execute_request`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecuteRequest {
    pub code: String,
    pub silent: bool,
    pub store_history: bool,
    pub user_expressions: Map<String, Value>,
    pub allow_stdin: bool,
}

impl ExecuteRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            store_history: true,
            ..Default::default()
        }
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

/// Status field shared by all replies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
    Abort,
}

/// Contents of an `execute_reply`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecuteReply {
    pub status: ReplyStatus,
    pub execution_count: u64,
    pub payload: Vec<Value>,
    pub user_expressions: Map<String, Value>,
}

impl ExecuteReply {
    pub fn new(status: ReplyStatus, execution_count: u64) -> Self {
        Self {
            status,
            execution_count,
            payload: Vec::new(),
            user_expressions: Map::new(),
        }
    }
}

/// Which output stream a stream event belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

/// Contents of a `stream` message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamEvent {
    pub name: StreamName,
    pub text: String,
}

impl StreamEvent {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            name: StreamName::Stdout,
            text: text.into(),
        }
    }
}

/// Contents of a `complete_request`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompleteRequest {
    pub code: String,
    pub cursor_pos: usize,
}

/// Contents of a `complete_reply`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteReply {
    pub status: ReplyStatus,
    pub matches: Vec<String>,
    pub cursor_start: usize,
    pub cursor_end: usize,
    pub metadata: Map<String, Value>,
}

/// Contents of an `is_complete_request`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IsCompleteRequest {
    pub code: String,
}

/// Verdict of the completeness pre-check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    Incomplete,
    Invalid,
    Unknown,
}

/// Contents of an `is_complete_reply`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IsCompleteReply {
    pub status: Completeness,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indent: Option<String>,
}
