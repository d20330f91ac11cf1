use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-facing action string chosen by a handler (e.g. `"NEED_P2"`).
pub type ActionId = String;

/// Reserved action tags. Handlers may not reuse these for their own orders.
pub mod action {
    pub const END: &str = "END";
    pub const ORDER: &str = "ORDER";
    pub const ORDER_REWIND: &str = "ORDER_REWIND";
    pub const ORDER_JUMP: &str = "ORDER_JUMP";
    pub const UNKNOWN: &str = "UNKNOWN";
    pub const ERROR: &str = "ERROR";

    /// Returns true if `tag` is owned by the engine.
    pub fn is_reserved(tag: &str) -> bool {
        matches!(tag, END | ORDER | ORDER_REWIND | ORDER_JUMP | UNKNOWN | ERROR)
    }
}

/// The single continuation a handler emits per invocation.
///
/// `Signal` is "control flow as data": the handler never calls the next
/// handler itself, it only tells the engine what should happen next.
/// Counts are relative to the slot of the signaling handler, so
/// `Rewind(0)` re-runs it and `Jump(2)` skips the handler after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    /// Continue with the next handler inside the same request.
    Next,

    /// Stop the flow and reply with `data`. Session state is discarded.
    End { data: Option<Value> },

    /// Reply with `action`/`data`; resume at the next handler.
    Order {
        action: ActionId,
        data: Option<Value>,
    },

    /// Move back `count` handlers and keep running.
    Rewind { count: usize },

    /// Move forward `count` handlers and keep running.
    Jump { count: usize },

    /// Reply with `action`/`data`; resume `count` handlers back.
    OrderRewind {
        action: ActionId,
        data: Option<Value>,
        count: usize,
    },

    /// Reply with `action`/`data`; resume `count` handlers ahead.
    OrderJump {
        action: ActionId,
        data: Option<Value>,
        count: usize,
    },
}

impl Signal {
    /// Short tag used in logs and spans.
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Next => "NEXT",
            Signal::End { .. } => action::END,
            Signal::Order { .. } => action::ORDER,
            Signal::Rewind { .. } => "REWIND",
            Signal::Jump { .. } => "JUMP",
            Signal::OrderRewind { .. } => action::ORDER_REWIND,
            Signal::OrderJump { .. } => action::ORDER_JUMP,
        }
    }

    /// Whether the engine stops and answers the caller on this signal.
    pub fn replies(&self) -> bool {
        !matches!(
            self,
            Signal::Next | Signal::Rewind { .. } | Signal::Jump { .. }
        )
    }
}
