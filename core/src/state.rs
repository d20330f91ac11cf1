//! State - Client-Held Session State
//!
//! `SessionState` is what travels inside the token. `State` is the view a
//! single handler invocation gets: it is writable until the handler emits
//! its signal, after which every write is ignored (and logged).

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Reserved key holding the resumption offset inside a token.
pub const RESUME_KEY: &str = "$$FLOW_ID";

/// The serialized session: user values plus the resumption offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Slot the next request resumes from.
    #[serde(
        rename = "$$FLOW_ID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub resume_at: Option<usize>,

    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty session produces no token at all.
    pub fn is_empty(&self) -> bool {
        self.resume_at.is_none() && self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.resume_at = None;
        self.values.clear();
    }
}

#[derive(Debug, Default)]
struct StateCell {
    values: Map<String, Value>,
    sealed: bool,
}

/// Per-step view over the session values.
///
/// Clones share the same cell, so the engine and the `Handle` observe the
/// same `sealed` flag as the handler.
#[derive(Debug, Clone, Default)]
pub struct State {
    cell: Arc<Mutex<StateCell>>,
}

impl State {
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            cell: Arc::new(Mutex::new(StateCell {
                values,
                sealed: false,
            })),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.cell.lock().values.get(key).cloned()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.cell
            .lock()
            .values
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(self.cell.lock().values.get(key), Some(v) if !v.is_null())
    }

    /// Writes `value` under `key`. Returns `false` if the write was ignored
    /// because the state is sealed or the key is reserved.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if key == RESUME_KEY {
            tracing::warn!(key = %key, "Ignoring write to reserved state key");
            return false;
        }
        let mut cell = self.cell.lock();
        if cell.sealed {
            tracing::warn!(key = %key, "State is sealed after signal; write ignored");
            return false;
        }
        cell.values.insert(key, value.into());
        true
    }

    /// Removes `key`. Returns the previous value, or `None` if sealed.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut cell = self.cell.lock();
        if cell.sealed {
            tracing::warn!(key = %key, "State is sealed after signal; remove ignored");
            return None;
        }
        cell.values.remove(key)
    }

    pub fn clear(&self) {
        let mut cell = self.cell.lock();
        if cell.sealed {
            tracing::warn!("State is sealed after signal; clear ignored");
            return;
        }
        cell.values.clear();
    }

    pub fn len(&self) -> usize {
        self.cell.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell.lock().values.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.cell.lock().sealed
    }

    /// Freeze the view. Idempotent.
    pub fn seal(&self) {
        self.cell.lock().sealed = true;
    }

    /// Copy of the current values.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.cell.lock().values.clone()
    }

    /// Current values as a JSON object, handy for `h.end(state.to_value())`.
    pub fn to_value(&self) -> Value {
        Value::Object(self.snapshot())
    }
}
