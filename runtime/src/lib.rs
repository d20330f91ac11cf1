//! # Callo Runtime
//!
//! Startup registration, the session codec and the per-request engine.
//! Protocol adapters hand the engine a [`Request`] and serialize the
//! [`Response`] it returns.

pub mod builder;
pub mod codec;
pub mod config;
pub mod engine;
pub mod message;

pub use builder::{Callo, CalloBuilder, StartupError};
pub use codec::{Secret, SessionCodec, SessionKey, TokenError};
pub use config::{ConfigError, CryptConfig, EngineConfig};
pub use engine::{Engine, StepFailure};
pub use message::{FailureKind, Request, Response};

pub mod prelude {
    pub use crate::builder::Callo;
    pub use crate::engine::Engine;
    pub use crate::message::{Request, Response};
    pub use callo_core::prelude::*;
}
