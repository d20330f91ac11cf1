//! # Callo Core
//!
//! Protocol-agnostic building blocks of the Callo engine: flows, the
//! compiled flow table, and the signal API handlers use to drive it.

pub mod error;
pub mod flow;
pub mod handle;
pub mod handler;
pub mod props;
pub mod signal;
pub mod state;
pub mod table;

pub use error::RegistrationError;
pub use flow::{Flow, IntoChain, NamedFlow};
pub use handle::Handle;
pub use handler::{Handler, HandlerFn, HandlerResult, SharedHandler, handler_fn};
pub use props::Props;
pub use signal::{ActionId, Signal, action};
pub use state::{RESUME_KEY, SessionState, State};
pub use table::{Cursor, FlowTable};

pub mod prelude {
    pub use crate::flow::{Flow, NamedFlow};
    pub use crate::handle::Handle;
    pub use crate::handler::{Handler, HandlerResult, handler_fn};
    pub use crate::props::Props;
    pub use crate::signal::Signal;
    pub use crate::state::State;
    pub use async_trait::async_trait;
}
