//! Wire messages exchanged at the adapter ↔ engine boundary.

use callo_core::action;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound call: `{ name?, props?, state? }`.
///
/// `name` is only consulted when `state` is absent or carries no
/// resumption offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Request {
    /// Start the flow `name`.
    pub fn dial(name: impl Into<String>, props: Map<String, Value>) -> Self {
        Self {
            name: Some(name.into()),
            props: Some(props),
            state: None,
        }
    }

    /// Continue from a previously returned token.
    pub fn resume(token: impl Into<String>, props: Map<String, Value>) -> Self {
        Self {
            name: None,
            props: Some(props),
            state: Some(token.into()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Outbound reply: `{ action?, data?, state?, error? }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Reply for a flow name that is not registered.
    pub fn unknown() -> Self {
        Self {
            action: Some(action::UNKNOWN.to_string()),
            ..Default::default()
        }
    }

    /// Generic failure reply. Never carries state.
    pub fn failure(kind: FailureKind) -> Self {
        Self {
            action: Some(action::ERROR.to_string()),
            error: Some(kind.code().to_string()),
            ..Default::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-request failures, as exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The token could not be verified, decoded, or has expired.
    InvalidState,
    /// A handler returned an error or panicked.
    HandlerFailed,
    /// A handler did not signal within the step timeout.
    Timeout,
    /// The request exceeded the step budget (e.g. endless replay).
    StepLimit,
    /// The reply could not be sealed.
    Internal,
}

impl FailureKind {
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::InvalidState => "invalid_state",
            FailureKind::HandlerFailed => "handler_failed",
            FailureKind::Timeout => "timeout",
            FailureKind::StepLimit => "step_limit",
            FailureKind::Internal => "internal",
        }
    }
}
