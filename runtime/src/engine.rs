//! # Engine: Per-Request Execution
//!
//! The engine walks the frozen `FlowTable` for one request at a time:
//!
//! 1. Resolve the start slot, from the token's resumption offset or from
//!    the flow name.
//! 2. Invoke the handler at the cursor and await its single signal under
//!    the step timeout.
//! 3. `NEXT`/`REWIND`/`JUMP` move the cursor and loop inside the same
//!    request; `END` and the `ORDER*` family stop and reply.
//!
//! Nothing survives the request except what is sealed into the token.

use callo_core::{
    FlowTable, Handle, Props, SessionState, SharedHandler, Signal, State, action,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::codec::SessionCodec;
use crate::config::EngineConfig;
use crate::message::{FailureKind, Request, Response};

/// Why a single step did not produce a signal.
#[derive(Error, Debug)]
pub enum StepFailure {
    #[error("handler failed: {0}")]
    Failed(#[source] anyhow::Error),
    #[error("handler panicked: {0}")]
    Panicked(String),
    #[error("handler did not signal within {0:?}")]
    TimedOut(std::time::Duration),
}

impl StepFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            StepFailure::Failed(_) | StepFailure::Panicked(_) => FailureKind::HandlerFailed,
            StepFailure::TimedOut(_) => FailureKind::Timeout,
        }
    }
}

/// The request state machine.
///
/// Cheap to clone; clones share the table and the codec. The table is
/// read-only from here on, so concurrent requests need no locking.
#[derive(Clone)]
pub struct Engine {
    table: Arc<FlowTable>,
    codec: Arc<SessionCodec>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(table: FlowTable, codec: SessionCodec, config: EngineConfig) -> Self {
        Self {
            table: Arc::new(table),
            codec: Arc::new(codec),
            config,
        }
    }

    pub fn table(&self) -> &FlowTable {
        &self.table
    }

    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one request to its reply. Never fails: every error becomes a
    /// structured `Response`.
    pub async fn dispatch(&self, request: Request) -> Response {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "Dispatch",
            callo.flow = request.name.as_deref().unwrap_or("-"),
            callo.resumed = request.state.is_some(),
            callo.request_id = %request_id
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: Request) -> Response {
        let Request { name, props, state } = request;
        let props = Props::new(props.unwrap_or_default());

        let mut session = match state {
            Some(token) => match self.codec.decrypt(&token) {
                Ok(session) => session,
                Err(_) => {
                    tracing::warn!("Rejected request with invalid state token");
                    return Response::failure(FailureKind::InvalidState);
                }
            },
            None => SessionState::new(),
        };

        // A token without an offset carries state only; fall back to the name.
        let start = match session.resume_at.take() {
            Some(offset) => offset,
            None => match name.as_deref().and_then(|n| self.table.start_offset(n)) {
                Some(offset) => offset,
                None => {
                    tracing::debug!(flow = ?name, "Unknown flow");
                    return Response::unknown();
                }
            },
        };

        let mut cursor = self.table.cursor(start);
        let mut steps = 0usize;

        loop {
            let Some(handler) = cursor.current() else {
                tracing::warn!(
                    offset = cursor.offset(),
                    "Reached end of flow without explicit reply"
                );
                return self.reply(Some(action::UNKNOWN.to_string()), None, session);
            };

            steps += 1;
            if steps > self.config.max_steps {
                tracing::error!(steps, offset = cursor.offset(), "Step limit exceeded");
                return Response::failure(FailureKind::StepLimit);
            }

            let signal = match self.step(handler, cursor.offset(), &props, &mut session).await {
                Ok(signal) => signal,
                Err(failure) => {
                    tracing::error!(error = %failure, offset = cursor.offset(), "Step failed");
                    return Response::failure(failure.kind());
                }
            };

            match signal {
                Signal::Next => cursor.next(),
                Signal::Rewind { count } => cursor.rewind_by(count),
                Signal::Jump { count } => cursor.jump_by(count),
                Signal::End { data } => {
                    session.clear();
                    return self.reply(None, data, session);
                }
                Signal::Order { action, data } => {
                    cursor.next();
                    session.resume_at = Some(cursor.offset());
                    return self.reply(Some(action), data, session);
                }
                Signal::OrderRewind {
                    action,
                    data,
                    count,
                } => {
                    cursor.rewind_by(count);
                    session.resume_at = Some(cursor.offset());
                    return self.reply(Some(action), data, session);
                }
                Signal::OrderJump {
                    action,
                    data,
                    count,
                } => {
                    cursor.jump_by(count);
                    session.resume_at = Some(cursor.offset());
                    return self.reply(Some(action), data, session);
                }
            }
        }
    }

    /// Invoke one handler and wait for its signal.
    ///
    /// The handler runs on its own task so that it may keep working after
    /// it signaled; the state view it holds is sealed by then, so nothing
    /// it does afterwards reaches the next step.
    async fn step(
        &self,
        handler: &SharedHandler,
        slot: usize,
        props: &Props,
        session: &mut SessionState,
    ) -> Result<Signal, StepFailure> {
        let span = tracing::debug_span!("Step", callo.slot = slot, callo.handler = handler.name());

        async move {
            let state = State::new(std::mem::take(&mut session.values));
            let (h, rx) = Handle::new(slot, state.clone());

            let task = {
                let handler = handler.clone();
                let props = props.clone();
                let state = state.clone();
                tokio::spawn(async move { handler.call(h, props, state).await })
            };
            let abort = task.abort_handle();

            let start = Instant::now();
            let timeout = self.config.step_timeout();
            let result = match tokio::time::timeout(timeout, await_signal(rx, task)).await {
                Ok(result) => result,
                Err(_) => {
                    abort.abort();
                    Err(StepFailure::TimedOut(timeout))
                }
            };

            state.seal();
            session.values = state.snapshot();

            if let Ok(signal) = &result {
                tracing::debug!(signal = signal.kind(), duration = ?start.elapsed(), "Step completed");
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Seal `session` into the reply. Empty sessions produce no token.
    fn reply(&self, action: Option<String>, data: Option<Value>, session: SessionState) -> Response {
        let state = if session.is_empty() {
            None
        } else {
            match self.codec.encrypt(&session) {
                Ok(token) => Some(token),
                Err(err) => {
                    tracing::error!(error = %err, "Failed to seal session state");
                    return Response::failure(FailureKind::Internal);
                }
            }
        };

        Response {
            action,
            data,
            state,
            error: None,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("table", &self.table)
            .field("config", &self.config)
            .finish()
    }
}

/// Wait for the handler's signal. If the handler finished without one,
/// decide between an implicit `next()` and a failure.
async fn await_signal(
    rx: oneshot::Receiver<Signal>,
    task: JoinHandle<callo_core::HandlerResult>,
) -> Result<Signal, StepFailure> {
    match rx.await {
        Ok(signal) => Ok(signal),
        Err(_) => match task.await {
            Ok(Ok(())) => {
                tracing::warn!("Handler returned without a signal; treating as next()");
                Ok(Signal::Next)
            }
            Ok(Err(err)) => Err(StepFailure::Failed(err)),
            Err(join) => Err(StepFailure::Panicked(join.to_string())),
        },
    }
}
