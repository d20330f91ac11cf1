//! # Callo
//!
//! Multi-step request/response flows on a stateless server. Handlers are
//! chained into named flows; between requests the continuation state lives
//! in an encrypted token the caller round-trips.
//!
//! ```rust,ignore
//! use callo::prelude::*;
//!
//! async fn ask_name(h: Handle, props: Props, state: State) -> HandlerResult {
//!     match props.get_str("name") {
//!         Some(name) => {
//!             state.set("name", name);
//!             h.next();
//!         }
//!         None => {
//!             h.order_replay("SUBMIT_NAME", json!({ "hint": "what is your name?" }));
//!         }
//!     }
//!     Ok(())
//! }
//!
//! let engine = Callo::builder()
//!     .password("secret")
//!     .on("reservation", Flow::new().then(handler_fn(ask_name)).then(handler_fn(confirm)))
//!     .build()?;
//! HttpIngress::new(engine).bind("127.0.0.1:8000").run().await?;
//! ```

pub mod config;

pub use callo_core as core;
pub use callo_http as http;
pub use callo_observe as observe;
pub use callo_runtime as runtime;

pub use callo_core::{
    Flow, Handle, Handler, HandlerResult, NamedFlow, Props, RegistrationError, Signal, State,
    action, handler_fn,
};
pub use callo_http::{CalloSession, HttpConfig, HttpIngress};
pub use callo_runtime::{
    Callo, CalloBuilder, ConfigError, CryptConfig, Engine, EngineConfig, Request, Response,
    Secret, StartupError,
};
pub use config::AppConfig;

pub mod prelude {
    pub use crate::config::AppConfig;
    pub use callo_core::prelude::*;
    pub use callo_http::{CalloSession, HttpIngress};
    pub use callo_runtime::{Callo, Engine, Request, Response};
    pub use serde_json::json;
}
