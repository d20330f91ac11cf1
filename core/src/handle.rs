//! Handle - the Signal API given to every handler invocation.
//!
//! Signals are advisory completions, not calls: emitting one tells the
//! engine what to do once the handler is done with this step. Only the
//! first signal counts. The state view is sealed at the same moment.

use crate::signal::{ActionId, Signal, action};
use crate::state::State;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;

struct HandleInner {
    slot: usize,
    state: State,
    completion: Mutex<Option<oneshot::Sender<Signal>>>,
}

/// Single-use signal emitter bound to one handler invocation.
///
/// Cloning is cheap; all clones share the same completion channel, so a
/// handler may move a clone into a spawned task and signal from there.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<HandleInner>,
}

impl Handle {
    /// Create a handle for the handler at `slot`, returning the receiver
    /// the engine awaits.
    pub fn new(slot: usize, state: State) -> (Self, oneshot::Receiver<Signal>) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            inner: Arc::new(HandleInner {
                slot,
                state,
                completion: Mutex::new(Some(tx)),
            }),
        };
        (handle, rx)
    }

    /// Table slot of the handler this handle belongs to.
    pub fn slot(&self) -> usize {
        self.inner.slot
    }

    /// Whether a signal has already been emitted.
    pub fn is_signaled(&self) -> bool {
        self.inner.completion.lock().is_none()
    }

    /// Emit `signal`. Returns `false` if this handle already signaled.
    pub fn emit(&self, signal: Signal) -> bool {
        let Some(tx) = self.inner.completion.lock().take() else {
            tracing::warn!(
                slot = self.inner.slot,
                signal = signal.kind(),
                "Cannot submit another signal from the same handler; ignored"
            );
            return false;
        };

        self.inner.state.seal();

        if tx.send(signal).is_err() {
            // Engine gave up on this step (timeout); nothing is listening.
            tracing::debug!(slot = self.inner.slot, "Signal emitted after engine stopped waiting");
        }
        true
    }

    /// Continue with the next handler.
    pub fn next(&self) -> bool {
        self.emit(Signal::Next)
    }

    /// End the flow, replying with `data`. No state is returned.
    pub fn end(&self, data: impl Into<Value>) -> bool {
        self.emit(Signal::End { data: payload(data.into()) })
    }

    /// Reply with `action`/`data`; the returned token resumes at the next handler.
    pub fn order(&self, action: impl Into<ActionId>, data: impl Into<Value>) -> bool {
        let action = checked_action(action.into());
        self.emit(Signal::Order {
            action,
            data: payload(data.into()),
        })
    }

    /// Reply with `action`/`data`; the returned token re-runs this handler.
    pub fn order_replay(&self, action: impl Into<ActionId>, data: impl Into<Value>) -> bool {
        self.order_rewind(0, action, data)
    }

    /// Reply with `action`/`data`; the returned token resumes `count` handlers back.
    pub fn order_rewind(
        &self,
        count: usize,
        action: impl Into<ActionId>,
        data: impl Into<Value>,
    ) -> bool {
        let action = checked_action(action.into());
        self.emit(Signal::OrderRewind {
            action,
            data: payload(data.into()),
            count,
        })
    }

    /// Reply with `action`/`data`; the returned token skips the next handler.
    pub fn order_skip(&self, action: impl Into<ActionId>, data: impl Into<Value>) -> bool {
        self.order_jump(2, action, data)
    }

    /// Reply with `action`/`data`; the returned token resumes `count` handlers ahead.
    pub fn order_jump(
        &self,
        count: usize,
        action: impl Into<ActionId>,
        data: impl Into<Value>,
    ) -> bool {
        let action = checked_action(action.into());
        self.emit(Signal::OrderJump {
            action,
            data: payload(data.into()),
            count,
        })
    }

    /// Run this handler again, within the same request.
    pub fn replay(&self) -> bool {
        self.rewind(0)
    }

    /// Continue with the handler `count` slots back, within the same request.
    pub fn rewind(&self, count: usize) -> bool {
        self.emit(Signal::Rewind { count })
    }

    /// Skip the next handler.
    pub fn skip(&self) -> bool {
        self.jump(2)
    }

    /// Continue with the handler `count` slots ahead, within the same request.
    pub fn jump(&self, count: usize) -> bool {
        self.emit(Signal::Jump { count })
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("slot", &self.inner.slot)
            .field("signaled", &self.is_signaled())
            .finish()
    }
}

/// `null` means "no data" on the wire.
fn payload(data: Value) -> Option<Value> {
    match data {
        Value::Null => None,
        data => Some(data),
    }
}

fn checked_action(tag: ActionId) -> ActionId {
    if action::is_reserved(&tag) {
        tracing::warn!(action = %tag, "Handler ordered with a reserved action tag");
    }
    tag
}
